//! Device status and reading history endpoints.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::json::{
    history_entry, require_device_id, DeviceJson, DeviceParams, DevicesResponse, HistoryParams,
    HistoryResponse, LatestResponse,
};
use crate::AppState;

/// Device routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/latest", get(latest_reading))
        .route("/history", get(reading_history))
}

/// Every known device with its last-seen time.
async fn list_devices(State(state): State<AppState>) -> Result<Json<DevicesResponse>, AppError> {
    let now = Utc::now();
    let threshold = state.config.offline_threshold;

    let devices = state
        .store
        .devices()?
        .into_iter()
        .map(|device| DeviceJson {
            offline: is_offline(device.last_seen, now, threshold),
            device_id: device.device_id,
            last_seen: device.last_seen,
        })
        .collect();

    Ok(Json(DevicesResponse { devices }))
}

/// Most recent reading of a device.
async fn latest_reading(
    State(state): State<AppState>,
    Query(params): Query<DeviceParams>,
) -> Result<Json<LatestResponse>, AppError> {
    let device_id = params.require()?;
    let stored = state
        .store
        .latest(&device_id)?
        .ok_or_else(|| AppError::NotFound(format!("No data found for device: {}", device_id)))?;

    let timestamp = stored.event.observed_at();
    Ok(Json(LatestResponse {
        offline: is_offline(timestamp, Utc::now(), state.config.offline_threshold),
        device_id,
        timestamp,
        data: stored.event.fields().clone(),
    }))
}

/// Readings of a device within an optional time window.
async fn reading_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let device_id = require_device_id(params.device_id)?;
    let rows = state
        .store
        .history(&device_id, params.from, params.to, params.limit)?;

    let metric = params.metric.as_deref().filter(|name| !name.is_empty());
    let history: Vec<_> = rows.iter().map(|row| history_entry(row, metric)).collect();

    Ok(Json(HistoryResponse {
        device_id,
        count: history.len(),
        history,
    }))
}

/// A device is offline once its newest reading is older than `threshold`.
fn is_offline(last_seen: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    match (now - last_seen).to_std() {
        Ok(age) => age > threshold,
        // Readings stamped in the future count as fresh.
        Err(_) => false,
    }
}
