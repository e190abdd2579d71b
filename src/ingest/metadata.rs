//! Topic→sensor metadata cache and its refresh loop.
//!
//! The per-message path reads the cache under a shared guard; a refresh
//! builds a complete replacement map off to the side and swaps it in under
//! the exclusive guard, which is held only for the swap. Readers therefore
//! always see either the previous full mapping or the new one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::MetadataEntry;
use crate::storage::{StorageResult, TimeSeriesRepository};

/// How often the background task re-reads the sensor catalog. New sensors
/// become ingestible within this window without a restart.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Shared mapping from raw topic to sensor metadata.
#[derive(Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<String, MetadataEntry>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one topic. Called on every incoming message, so this only
    /// takes the read guard for a map lookup.
    pub fn lookup(&self, topic: &str) -> Option<MetadataEntry> {
        self.entries.read().unwrap().get(topic).copied()
    }

    /// Atomically replace the whole mapping.
    pub fn replace(&self, entries: HashMap<String, MetadataEntry>) {
        *self.entries.write().unwrap() = entries;
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads sensor metadata from the catalog into a [`MetadataCache`].
pub struct MetadataService {
    store: Arc<dyn TimeSeriesRepository>,
    cache: Arc<MetadataCache>,
}

impl MetadataService {
    pub fn new(store: Arc<dyn TimeSeriesRepository>, cache: Arc<MetadataCache>) -> Self {
        Self { store, cache }
    }

    /// Pull all active sensors and swap the cache.
    ///
    /// On failure the previous mapping stays published; the caller decides
    /// whether that is fatal (startup) or a warning (steady state).
    pub async fn refresh(&self) -> StorageResult<usize> {
        let rows = self.store.load_sensor_metadata().await?;
        let count = rows.len();

        self.cache.replace(rows.into_iter().collect());

        info!(sensors = count, "sensor metadata refreshed");
        Ok(count)
    }

    /// Run the periodic refresh until `token` is cancelled.
    ///
    /// The first interval tick fires immediately, but startup has already
    /// done a blocking refresh, so the extra one is a harmless re-read.
    pub async fn run_refresh_loop(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("metadata refresh loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!("metadata refresh failed, keeping previous cache: {e}");
                    }
                }
            }
        }
    }
}
