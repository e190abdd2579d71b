//! Dual-write persistence of normalized events.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::events::SensorEvent;
use crate::storage::{LastValueRepository, StorageError, StorageResult, TimeSeriesRepository};

/// Deadline covering both writes of one event.
pub const SAVE_DEADLINE: Duration = Duration::from_secs(5);

/// Writes each accepted event to the time-series store and the last-value
/// cache. Sole writer of both stores.
pub struct Persister {
    store: Arc<dyn TimeSeriesRepository>,
    cache: Arc<dyn LastValueRepository>,
}

impl Persister {
    pub fn new(store: Arc<dyn TimeSeriesRepository>, cache: Arc<dyn LastValueRepository>) -> Self {
        Self { store, cache }
    }

    /// Decode a broker payload into an event.
    pub fn decode_event(payload: &[u8]) -> Result<SensorEvent, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Perform the dual write.
    ///
    /// The time-series append comes first and its failure fails the whole
    /// operation — except a primary-key conflict, which makes the event a
    /// logged no-op (the row already exists). The cache overwrite runs
    /// second; its failure is returned but the history row stays, keeping
    /// the time-series store the source of truth.
    pub async fn save_measurement(&self, event: &SensorEvent) -> StorageResult<()> {
        match self.store.insert_measurement(event).await {
            Ok(()) => {}
            Err(StorageError::DuplicateRow { sensor_id }) => {
                warn!(sensor_id, "duplicate measurement, skipping");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        self.cache.put_last(event.sensor_id, event.value).await
    }

    /// Full per-message path: decode, then save under [`SAVE_DEADLINE`].
    ///
    /// Every failure mode is isolated to this one message; the subscription
    /// keeps running.
    pub async fn handle_message(&self, payload: &[u8]) {
        let event = match Self::decode_event(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    payload = %String::from_utf8_lossy(payload),
                    "skipping malformed event payload: {e}"
                );
                return;
            }
        };

        match tokio::time::timeout(SAVE_DEADLINE, self.save_measurement(&event)).await {
            Ok(Ok(())) => {
                debug!(sensor_id = event.sensor_id, value = event.value, "measurement saved");
            }
            Ok(Err(e)) => {
                warn!(sensor_id = event.sensor_id, "failed to save measurement: {e}");
            }
            Err(_) => {
                warn!(
                    sensor_id = event.sensor_id,
                    "save timed out after {}s", SAVE_DEADLINE.as_secs()
                );
            }
        }
    }
}
