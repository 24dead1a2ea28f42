//! JSON request and response types for the HTTP gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use windmill_core::{MetricValue, Metrics, Reading, StoredReading};

use crate::error::AppError;

/// Reading reported by a device.
#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    pub device_id: Option<String>,
    /// Observation time in milliseconds since the Unix epoch.
    pub ts: Option<f64>,
    pub voltage_v: Option<f64>,
    pub current_a: Option<f64>,
    pub rpm: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub temp_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub wind_mps: Option<f64>,
}

impl IngestRequest {
    /// Validate the request into a reading.
    pub fn into_reading(self) -> Result<Reading, AppError> {
        let device_id = self.device_id.ok_or_else(|| missing_field("device_id"))?;
        let ts = self.ts.ok_or_else(|| missing_field("ts"))?;
        if !ts.is_finite() {
            return Err(AppError::BadRequest(format!("invalid timestamp: {}", ts)));
        }

        let mut reading = Reading::from_millis(device_id, ts as i64)?;
        reading.voltage_v = self.voltage_v;
        reading.current_a = self.current_a;
        reading.rpm = self.rpm.map(|rpm| rpm.round() as i64);
        reading.pressure_hpa = self.pressure_hpa;
        reading.temp_c = self.temp_c;
        reading.humidity_pct = self.humidity_pct;
        reading.wind_mps = self.wind_mps;
        Ok(reading)
    }
}

fn missing_field(name: &str) -> AppError {
    AppError::BadRequest(format!("Missing required field: {}", name))
}

/// Ingestion response.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub id: u64,
    pub device_id: String,
}

/// Query parameters naming a device.
#[derive(Debug, Deserialize)]
pub struct DeviceParams {
    pub device_id: Option<String>,
}

impl DeviceParams {
    /// The device id, or a bad request when absent.
    pub fn require(self) -> Result<String, AppError> {
        require_device_id(self.device_id)
    }
}

/// Reject a missing or empty device id.
pub fn require_device_id(device_id: Option<String>) -> Result<String, AppError> {
    match device_id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(AppError::BadRequest("device_id parameter required".to_string())),
    }
}

/// Device status entry.
#[derive(Debug, Serialize)]
pub struct DeviceJson {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
    pub offline: bool,
}

/// Device list response.
#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceJson>,
}

/// Latest reading response.
#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub offline: bool,
    pub data: Metrics,
}

/// Query parameters for history.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub device_id: Option<String>,
    /// Only return this metric.
    pub metric: Option<String>,
    /// Inclusive lower bound, milliseconds since the Unix epoch.
    pub from: Option<i64>,
    /// Inclusive upper bound, milliseconds since the Unix epoch.
    pub to: Option<i64>,
    /// Maximum number of readings to return.
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    1000
}

/// History response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub device_id: String,
    pub count: usize,
    pub history: Vec<Map<String, Value>>,
}

/// One history row: timestamps plus either every metric or just `metric`.
pub fn history_entry(reading: &StoredReading, metric: Option<&str>) -> Map<String, Value> {
    let event = &reading.event;
    let mut entry = Map::new();
    entry.insert(
        "timestamp".to_string(),
        Value::String(event.observed_at().to_rfc3339()),
    );
    entry.insert("ts".to_string(), Value::from(event.observed_millis()));

    match metric {
        Some(name) => {
            entry.insert(name.to_string(), metric_json(event.metric(name)));
        }
        None => {
            for (name, value) in event.fields() {
                entry.insert(name.clone(), metric_json(*value));
            }
        }
    }

    entry
}

/// JSON form of an optional metric value.
pub fn metric_json(value: Option<MetricValue>) -> Value {
    match value {
        Some(MetricValue::Int(v)) => Value::from(v),
        Some(MetricValue::Float(v)) => Value::from(v),
        None => Value::Null,
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub readings: usize,
    pub subscribers: SubscriberStats,
}

/// Live subscriber counts.
#[derive(Debug, Serialize)]
pub struct SubscriberStats {
    pub devices: usize,
    pub channels: usize,
}

/// Request body for generating readings.
#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    #[serde(default = "default_simulate_count")]
    pub count: usize,
    #[serde(default = "default_simulate_device")]
    pub device_id: String,
}

impl Default for SimulateRequest {
    fn default() -> Self {
        Self {
            count: default_simulate_count(),
            device_id: default_simulate_device(),
        }
    }
}

fn default_simulate_count() -> usize {
    20
}

fn default_simulate_device() -> String {
    "esp32-001".to_string()
}

/// Response of the simulation endpoint.
#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub status: &'static str,
    pub device_id: String,
    pub count: usize,
    pub message: String,
}

/// Response of the clear endpoint.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub status: &'static str,
    pub deleted: usize,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use windmill_core::event::{POWER_W, RPM, VOLTAGE_V};

    #[test]
    fn test_missing_fields() {
        let err = IngestRequest::default().into_reading().unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: device_id");

        let request = IngestRequest {
            device_id: Some("turbine-1".into()),
            ..Default::default()
        };
        assert_eq!(
            request.into_reading().unwrap_err().to_string(),
            "Missing required field: ts"
        );
    }

    #[test]
    fn test_into_reading() {
        let request: IngestRequest = serde_json::from_str(
            r#"{"device_id":"turbine-1","ts":1714564800000,"voltage_v":12.0,"current_a":1.5,"rpm":3400.4}"#,
        )
        .unwrap();
        let reading = request.into_reading().unwrap();

        assert_eq!(reading.observed_at.timestamp_millis(), 1_714_564_800_000);
        assert_eq!(reading.rpm, Some(3400));
        assert_eq!(reading.power_w(), Some(18.0));
    }

    #[test]
    fn test_history_entry() {
        let mut reading = Reading::from_millis("turbine-1", 1_000).unwrap();
        reading.voltage_v = Some(12.0);
        reading.current_a = Some(2.0);
        reading.rpm = Some(3000);
        let stored = StoredReading {
            id: 1,
            event: reading.to_event(),
        };

        let full = history_entry(&stored, None);
        assert_eq!(full["ts"], 1_000);
        assert_eq!(full[POWER_W], 24.0);
        assert_eq!(full[RPM], 3000);
        assert!(full["temp_c"].is_null());

        let single = history_entry(&stored, Some(VOLTAGE_V));
        assert_eq!(single.len(), 3);
        assert_eq!(single[VOLTAGE_V], 12.0);

        let unknown = history_entry(&stored, Some("torque"));
        assert!(unknown["torque"].is_null());
    }
}
