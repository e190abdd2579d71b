//! In-memory backends.
//!
//! No persistence and no network; these exist so pipeline logic (persister
//! dual-write, metadata refresh, read API join) can be exercised without a
//! running Postgres or Valkey. `set_failing(true)` makes every operation
//! return an error, which is how the failure-path tests simulate an
//! unreachable store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::{StorageError, StorageResult};
use super::schema::SensorRow;
use super::{LastValueRepository, TimeSeriesRepository};
use crate::events::{HistoryPoint, MetadataEntry, SensorEvent};

/// In-memory stand-in for the time-series store.
#[derive(Default)]
pub struct MemoryTimeSeries {
    catalog: Mutex<Vec<SensorRow>>,
    metadata: Mutex<Vec<(String, MetadataEntry)>>,
    // keyed like the real primary key, so duplicates behave the same
    rows: Mutex<BTreeMap<(DateTime<Utc>, i64), f64>>,
    failing: AtomicBool,
}

impl MemoryTimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensor in the catalog and the metadata join.
    pub fn seed_sensor(&self, row: SensorRow, min_value: Option<f64>, max_value: Option<f64>) {
        let entry = MetadataEntry {
            sensor_id: row.id,
            min_value,
            max_value,
        };
        self.metadata
            .lock()
            .unwrap()
            .push((row.topic.clone(), entry));
        self.catalog.lock().unwrap().push(row);
    }

    /// Make every subsequent operation fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn measurement_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::QueryFailed("store marked failing".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TimeSeriesRepository for MemoryTimeSeries {
    async fn insert_measurement(&self, event: &SensorEvent) -> StorageResult<()> {
        self.check_available()?;

        let mut rows = self.rows.lock().unwrap();
        let key = (event.timestamp, event.sensor_id);
        if rows.contains_key(&key) {
            return Err(StorageError::DuplicateRow {
                sensor_id: event.sensor_id,
            });
        }
        rows.insert(key, event.value);
        Ok(())
    }

    async fn load_sensor_metadata(&self) -> StorageResult<Vec<(String, MetadataEntry)>> {
        self.check_available()?;
        Ok(self.metadata.lock().unwrap().clone())
    }

    async fn list_active_sensors(&self) -> StorageResult<Vec<SensorRow>> {
        self.check_available()?;
        let mut sensors = self.catalog.lock().unwrap().clone();
        sensors.sort_by_key(|row| row.id);
        Ok(sensors)
    }

    async fn history_since(
        &self,
        sensor_id: i64,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HistoryPoint>> {
        self.check_available()?;

        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((time, id), _)| *id == sensor_id && *time >= since)
            .map(|((time, _), value)| HistoryPoint {
                time: *time,
                value: *value,
            })
            .collect())
    }

    async fn close(&self) {}
}

/// In-memory stand-in for the last-value cache. The lease is not modeled;
/// tests that care about expiry drive it by overwriting or removing entries.
#[derive(Default)]
pub struct MemoryLastValue {
    values: Mutex<HashMap<i64, String>>,
    failing: AtomicBool,
}

impl MemoryLastValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Drop a cached entry, as TTL expiry would.
    pub fn evict(&self, sensor_id: i64) {
        self.values.lock().unwrap().remove(&sensor_id);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::CacheFailed("cache marked failing".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LastValueRepository for MemoryLastValue {
    async fn put_last(&self, sensor_id: i64, value: f64) -> StorageResult<()> {
        self.check_available()?;
        self.values
            .lock()
            .unwrap()
            .insert(sensor_id, value.to_string());
        Ok(())
    }

    async fn fetch_last(&self, sensor_id: i64) -> StorageResult<Option<String>> {
        self.check_available()?;
        Ok(self.values.lock().unwrap().get(&sensor_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(sensor_id: i64, value: f64, secs: u32) -> SensorEvent {
        SensorEvent {
            sensor_id,
            value,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, secs).unwrap(),
        }
    }

    #[tokio::test]
    async fn duplicate_primary_key_is_reported() {
        let store = MemoryTimeSeries::new();

        store.insert_measurement(&event(1, 10.0, 0)).await.unwrap();
        let err = store
            .insert_measurement(&event(1, 11.0, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateRow { sensor_id: 1 }));
        assert_eq!(store.measurement_count(), 1);
    }

    #[tokio::test]
    async fn same_timestamp_different_sensor_is_fine() {
        let store = MemoryTimeSeries::new();

        store.insert_measurement(&event(1, 10.0, 0)).await.unwrap();
        store.insert_measurement(&event(2, 10.0, 0)).await.unwrap();

        assert_eq!(store.measurement_count(), 2);
    }

    #[tokio::test]
    async fn history_filters_by_sensor_and_window() {
        let store = MemoryTimeSeries::new();

        store.insert_measurement(&event(1, 1.0, 0)).await.unwrap();
        store.insert_measurement(&event(1, 2.0, 30)).await.unwrap();
        store.insert_measurement(&event(2, 9.0, 30)).await.unwrap();

        let since = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 10).unwrap();
        let points = store.history_since(1, since).await.unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 2.0);
    }
}
