//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;

use crate::json::{HealthResponse, SubscriberStats};
use crate::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        readings: state.store.count(),
        subscribers: SubscriberStats {
            devices: state.registry.device_count(),
            channels: state.registry.channel_count(),
        },
    })
}
