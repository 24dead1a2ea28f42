//! The immutable event handed to live subscribers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generator output voltage in volts.
pub const VOLTAGE_V: &str = "voltage_v";
/// Generator output current in amperes.
pub const CURRENT_A: &str = "current_a";
/// Derived output power in watts.
pub const POWER_W: &str = "power_w";
/// Rotor speed in revolutions per minute.
pub const RPM: &str = "rpm";
/// Barometric pressure in hectopascals.
pub const PRESSURE_HPA: &str = "pressure_hpa";
/// Ambient temperature in degrees Celsius.
pub const TEMP_C: &str = "temp_c";
/// Relative humidity in percent.
pub const HUMIDITY_PCT: &str = "humidity_pct";
/// Wind speed in metres per second.
pub const WIND_MPS: &str = "wind_mps";

/// Every metric a device reading can carry, in wire order.
pub const METRIC_NAMES: [&str; 8] = [
    VOLTAGE_V,
    CURRENT_A,
    POWER_W,
    RPM,
    PRESSURE_HPA,
    TEMP_C,
    HUMIDITY_PCT,
    WIND_MPS,
];

/// A single numeric metric value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    /// Widen the value to a float.
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Float(v) => v,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Int(value)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Named metrics of a reading. A `None` value means the device did not
/// report that metric.
pub type Metrics = BTreeMap<String, Option<MetricValue>>;

/// Snapshot of one ingested reading for one device.
///
/// Events are shared between every subscriber channel of a device behind an
/// `Arc`, so nothing can mutate one after it has been broadcast. The
/// consuming builder methods only apply before that point.
///
/// Serialized flat, the same shape live viewers receive:
///
/// ```text
/// {"device_id":"turbine-1","timestamp":"2024-05-01T12:00:00Z","voltage_v":12.1,...}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    device_id: String,
    #[serde(rename = "timestamp")]
    observed_at: DateTime<Utc>,
    #[serde(flatten)]
    fields: Metrics,
}

impl Event {
    /// Create an event from its parts.
    pub fn new(device_id: impl Into<String>, observed_at: DateTime<Utc>, fields: Metrics) -> Self {
        Self {
            device_id: device_id.into(),
            observed_at,
            fields,
        }
    }

    /// Add a reported metric.
    pub fn with_metric(mut self, name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.fields.insert(name.into(), Some(value.into()));
        self
    }

    /// Add a metric the device left unreported.
    pub fn with_missing(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), None);
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Observation time as milliseconds since the Unix epoch.
    pub fn observed_millis(&self) -> i64 {
        self.observed_at.timestamp_millis()
    }

    pub fn fields(&self) -> &Metrics {
        &self.fields
    }

    /// Look up a metric. Returns `None` both for unknown and unreported
    /// metrics.
    pub fn metric(&self, name: &str) -> Option<MetricValue> {
        self.fields.get(name).copied().flatten()
    }
}
