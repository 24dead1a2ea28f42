//! Reading ingestion endpoint.

use axum::{extract::State, http::StatusCode, middleware, routing::post, Json, Router};

use crate::auth::require_api_key;
use crate::error::AppError;
use crate::json::{IngestRequest, IngestResponse};
use crate::AppState;

/// Ingestion routes, guarded by the API key.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/ingest", post(ingest))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

/// Persist a reading, then push it to live subscribers of its device.
async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let reading = request.into_reading()?;
    let stored = state.store.insert(&reading).await?;

    let outcome = state
        .publisher
        .broadcast(&reading.device_id, stored.event.clone());

    tracing::debug!(
        device_id = %reading.device_id,
        id = stored.id,
        delivered = outcome.delivered,
        dropped = outcome.dropped,
        "reading ingested"
    );

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            status: "success",
            id: stored.id,
            device_id: reading.device_id,
        }),
    ))
}
