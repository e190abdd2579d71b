//! Persistence backends for the pipeline.
//!
//! Two stores, each behind a trait:
//!
//! - [`TimeSeriesRepository`] — the durable, append-only history plus the
//!   sensor catalog (Postgres/TimescaleDB in production).
//! - [`LastValueRepository`] — the expirable last-value cache (Valkey in
//!   production).
//!
//! The traits exist so the persister, the ingestor's metadata refresh and the
//! read API can be exercised against the in-memory backend in tests. The
//! time-series store is the source of truth whenever the two diverge.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod valkey;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use error::{StorageError, StorageResult};
pub use memory::{MemoryLastValue, MemoryTimeSeries};
pub use postgres::TimeSeriesStore;
pub use schema::SensorRow;
pub use valkey::LastValueCache;

use crate::events::{HistoryPoint, MetadataEntry, SensorEvent};

/// Durable time-series history and sensor catalog.
///
/// Implementations must be `Send + Sync`; one connection is acquired per
/// query, so concurrent calls are fine.
#[async_trait]
pub trait TimeSeriesRepository: Send + Sync {
    /// Append one measurement row.
    ///
    /// An exact `(time, sensor_id)` duplicate returns
    /// [`StorageError::DuplicateRow`] so the caller can treat it as a no-op.
    async fn insert_measurement(&self, event: &SensorEvent) -> StorageResult<()>;

    /// All active sensors joined to their types, materialized as
    /// `(raw topic, metadata)` pairs for the ingestor cache.
    async fn load_sensor_metadata(&self) -> StorageResult<Vec<(String, MetadataEntry)>>;

    /// The active sensor catalog, ordered by id, for the read API.
    async fn list_active_sensors(&self) -> StorageResult<Vec<SensorRow>>;

    /// `(time, value)` pairs for one sensor since `since`, oldest first.
    /// An empty window is a valid, empty result.
    async fn history_since(
        &self,
        sensor_id: i64,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HistoryPoint>>;

    /// Release connections.
    async fn close(&self);
}

/// Expirable cache of each sensor's most recent value.
#[async_trait]
pub trait LastValueRepository: Send + Sync {
    /// Overwrite the cached value for a sensor, refreshing its lease.
    async fn put_last(&self, sensor_id: i64, value: f64) -> StorageResult<()>;

    /// Fetch the cached value as the stored decimal string.
    ///
    /// `Ok(None)` means "no value cached" — distinct from any number.
    async fn fetch_last(&self, sensor_id: i64) -> StorageResult<Option<String>>;
}
