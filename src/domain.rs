//! ==============================================================================
//! domain.rs - sensor reading types
//! ==============================================================================
//!
//! purpose:
//!     the data units that flow through the hub.
//!
//! ```text
//!     ReadingPayload  -> what a producer sends (every field optional)
//!     Reading         -> a fully populated reading
//!     StoredReading   -> a reading plus its row id in the log
//! ```
//!
//! json uses the producers' camelCase names ("sensorId", "type").
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// category of a sensor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Motion,
    Temperature,
    Humidity,
    Light,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Motion => "motion",
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Light => "light",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// inbound reading as sent by a producer
///
/// nothing is required at this level; the gateway decides what to reject.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPayload {
    #[serde(default)]
    pub sensor_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ReadingPayload {
    /// true when the producer sent an object with none of the known fields
    pub fn is_empty(&self) -> bool {
        self.sensor_id.is_none()
            && self.kind.is_none()
            && self.value.is_none()
            && self.timestamp.is_none()
    }
}

/// a reading with every required field present
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub sensor_id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: f64,
    /// ISO-8601, UTC
    pub timestamp: String,
}

impl From<Reading> for ReadingPayload {
    fn from(r: Reading) -> Self {
        Self {
            sensor_id: Some(r.sensor_id),
            kind: r.kind,
            value: Some(r.value),
            timestamp: Some(r.timestamp),
        }
    }
}

/// a row read back from the log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReading {
    pub id: i64,
    #[serde(flatten)]
    pub reading: Reading,
}
