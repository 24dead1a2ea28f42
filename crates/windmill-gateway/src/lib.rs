//! Windmill Monitor HTTP gateway.
//!
//! Devices post readings to `/api/v1/ingest`; each reading is persisted and
//! then fanned out to every live `/api/v1/stream` subscriber of that device.

pub mod auth;
pub mod config;
pub mod error;
pub mod json;
pub mod routes;

pub use config::{Args, CorsOrigins, GatewayConfig};
pub use error::AppError;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use windmill_core::{Publisher, ReadingStore, Registry, SharedRegistry};

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Persisted readings.
    pub store: Arc<ReadingStore>,
    /// Live stream subscribers.
    pub registry: SharedRegistry,
    /// Fans readings out to subscribers.
    pub publisher: Publisher,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: ReadingStore, config: GatewayConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let publisher = Publisher::new(registry.clone());
        Self {
            store: Arc::new(store),
            registry,
            publisher,
            config,
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let mut api = Router::new()
        .merge(routes::health::routes())
        .merge(routes::ingest::routes(state.clone()))
        .merge(routes::stream::routes())
        .merge(routes::devices::routes());
    if state.config.dev_routes {
        api = api.merge(routes::dev::routes());
    }

    let mut router = Router::new().nest("/api/v1", api);

    if let Some(dir) = &state.config.static_dir {
        let index = dir.join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_origins)),
        )
        .with_state(state)
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => AllowOrigin::list(
            list.iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::API_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}
