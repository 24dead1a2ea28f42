//! Development endpoints for seeding and wiping readings.

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use windmill_core::Reading;

use crate::error::AppError;
use crate::json::{require_device_id, ClearResponse, SimulateRequest, SimulateResponse};
use crate::AppState;

/// Largest number of readings one simulate request may generate.
pub const MAX_SIMULATE_COUNT: usize = 10_000;

/// Development routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dev/simulate", post(simulate))
        .route("/dev/clear", post(clear))
}

/// Store `count` generated readings, one minute apart, the newest one minute
/// before now.
async fn simulate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SimulateResponse>), AppError> {
    let request = if body.is_empty() {
        SimulateRequest::default()
    } else {
        serde_json::from_slice::<SimulateRequest>(&body)?
    };

    if request.count > MAX_SIMULATE_COUNT {
        return Err(AppError::BadRequest(format!(
            "count must not exceed {}",
            MAX_SIMULATE_COUNT
        )));
    }
    let device_id = require_device_id(Some(request.device_id))?;
    let readings = simulated_readings(&device_id, request.count, Utc::now());
    state.store.insert_many(&readings).await?;
    tracing::info!(device_id = %device_id, count = request.count, "simulated readings");

    Ok((
        StatusCode::CREATED,
        Json(SimulateResponse {
            status: "success",
            message: format!("Created {} simulated data points", request.count),
            device_id,
            count: request.count,
        }),
    ))
}

/// Delete every stored reading.
async fn clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    let deleted = state.store.clear().await?;
    tracing::info!(deleted, "cleared readings");

    Ok(Json(ClearResponse {
        status: "success",
        deleted,
        message: format!("Cleared {} data points", deleted),
    }))
}

fn simulated_readings(device_id: &str, count: usize, now: DateTime<Utc>) -> Vec<Reading> {
    let mut rng = rand::thread_rng();
    let mut readings = Vec::with_capacity(count);

    for i in 0..count {
        let minutes_ago = (count - i) as i64;
        let observed_at = now - Duration::minutes(minutes_ago);
        let mut reading = Reading::new(device_id, observed_at);

        reading.voltage_v = Some(round_to(12.0 + rng.gen_range(-1.0..1.0), 2));
        reading.current_a = Some(round_to(1.2 + rng.gen_range(-0.2..0.3), 2));
        reading.rpm = Some(3400 + rng.gen_range(-200..300));
        reading.pressure_hpa = Some(round_to(1013.0 + rng.gen_range(-5.0..5.0), 2));
        reading.temp_c = Some(round_to(25.0 + rng.gen_range(-3.0..3.0), 1));
        reading.humidity_pct = Some(round_to(55.0 + rng.gen_range(-10.0..10.0), 1));
        reading.wind_mps = Some(round_to(3.5 + rng.gen_range(-1.0..1.5), 1));
        readings.push(reading);
    }

    readings
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
