//! In-flight and read-side record shapes shared by the services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized event emitted by the ingestor and consumed by the persister.
///
/// This is the only shape the persister accepts. The timestamp is assigned by
/// the ingestor at processing time and is always UTC; it serializes as an
/// ISO-8601 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    /// Primary key of the sensor row the raw topic resolved to.
    pub sensor_id: i64,

    /// The validated measurement value.
    pub value: f64,

    /// Processing time, UTC.
    pub timestamp: DateTime<Utc>,
}

/// One point of a history query result.
///
/// Key names are kept short on the wire; a chart request returns thousands of
/// these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(rename = "t")]
    pub time: DateTime<Utc>,

    #[serde(rename = "v")]
    pub value: f64,
}

/// Catalog entry enriched with the live value, as served by `GET /api/sensors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorView {
    pub id: i64,

    /// Raw broker topic the sensor publishes on.
    pub topic: String,

    /// Human-readable name.
    pub name: String,

    /// Sensor type name (e.g. "temperature").
    #[serde(rename = "type")]
    pub type_name: String,

    pub unit: String,

    /// Last cached reading. `None` means "no live value", which is distinct
    /// from a reading of zero; it serializes as an explicit `null`.
    pub current_value: Option<f64>,
}

/// What the ingestor needs to know about a sensor to process one message,
/// keyed by raw topic in the metadata cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataEntry {
    pub sensor_id: i64,

    /// Lower validation bound; `None` leaves that side unbounded.
    pub min_value: Option<f64>,

    /// Upper validation bound; `None` leaves that side unbounded.
    pub max_value: Option<f64>,
}
