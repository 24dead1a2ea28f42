//! Validated device readings, as accepted by the ingestion path.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::event::{
    Event, MetricValue, Metrics, CURRENT_A, HUMIDITY_PCT, POWER_W, PRESSURE_HPA, RPM, TEMP_C,
    VOLTAGE_V, WIND_MPS,
};

/// One sensor reading reported by a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_id: String,
    pub observed_at: DateTime<Utc>,
    pub voltage_v: Option<f64>,
    pub current_a: Option<f64>,
    pub rpm: Option<i64>,
    pub pressure_hpa: Option<f64>,
    pub temp_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub wind_mps: Option<f64>,
}

impl Reading {
    /// Create a reading with no metrics reported.
    pub fn new(device_id: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            observed_at,
            voltage_v: None,
            current_a: None,
            rpm: None,
            pressure_hpa: None,
            temp_c: None,
            humidity_pct: None,
            wind_mps: None,
        }
    }

    /// Create a reading from a device timestamp in milliseconds since the
    /// Unix epoch.
    pub fn from_millis(device_id: impl Into<String>, ts: i64) -> Result<Self> {
        let device_id = device_id.into();
        if device_id.is_empty() {
            return Err(Error::InvalidReading("device_id must not be empty".to_string()));
        }

        let observed_at = Utc
            .timestamp_millis_opt(ts)
            .single()
            .ok_or_else(|| Error::InvalidReading(format!("timestamp out of range: {}", ts)))?;

        Ok(Self::new(device_id, observed_at))
    }

    /// Output power in watts, `P = V * I`, when both inputs are present.
    pub fn power_w(&self) -> Option<f64> {
        match (self.voltage_v, self.current_a) {
            (Some(v), Some(i)) => Some(v * i),
            _ => None,
        }
    }

    /// All metrics of this reading including the derived power. Unreported
    /// metrics are present with a `None` value.
    pub fn metrics(&self) -> Metrics {
        let float = |v: Option<f64>| v.map(MetricValue::Float);

        let mut metrics = Metrics::new();
        metrics.insert(VOLTAGE_V.to_string(), float(self.voltage_v));
        metrics.insert(CURRENT_A.to_string(), float(self.current_a));
        metrics.insert(POWER_W.to_string(), float(self.power_w()));
        metrics.insert(RPM.to_string(), self.rpm.map(MetricValue::Int));
        metrics.insert(PRESSURE_HPA.to_string(), float(self.pressure_hpa));
        metrics.insert(TEMP_C.to_string(), float(self.temp_c));
        metrics.insert(HUMIDITY_PCT.to_string(), float(self.humidity_pct));
        metrics.insert(WIND_MPS.to_string(), float(self.wind_mps));
        metrics
    }

    /// Build the event broadcast to live subscribers.
    pub fn to_event(&self) -> Event {
        Event::new(self.device_id.clone(), self.observed_at, self.metrics())
    }
}
