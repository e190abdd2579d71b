//! Valkey (Redis protocol) implementation of [`LastValueRepository`].
//!
//! Keys follow `sensor:last:<id>` with a 24 hour lease, so sensors that stop
//! reporting age out of the live view on their own.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::error::StorageResult;
use super::LastValueRepository;

/// Lease on a cached last value.
const LAST_VALUE_TTL_SECS: u64 = 24 * 60 * 60;

/// Async last-value cache client.
///
/// [`ConnectionManager`] multiplexes and reconnects internally, so clones are
/// cheap and no application-level locking is needed.
#[derive(Clone)]
pub struct LastValueCache {
    conn: ConnectionManager,
}

impl LastValueCache {
    /// Connect and verify the cache is reachable.
    ///
    /// `addr` is a bare `host:port`, per the deployment convention.
    pub async fn connect(addr: &str) -> StorageResult<Self> {
        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{addr}")
        };

        let client = redis::Client::open(url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;

        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        info!("connected to last-value cache");
        Ok(Self { conn })
    }

    fn key(sensor_id: i64) -> String {
        format!("sensor:last:{sensor_id}")
    }
}

#[async_trait]
impl LastValueRepository for LastValueCache {
    async fn put_last(&self, sensor_id: i64, value: f64) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::key(sensor_id), value.to_string(), LAST_VALUE_TTL_SECS)
            .await?;
        Ok(())
    }

    async fn fetch_last(&self, sensor_id: i64) -> StorageResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::key(sensor_id)).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_is_stable() {
        assert_eq!(LastValueCache::key(5), "sensor:last:5");
        assert_eq!(LastValueCache::key(1042), "sensor:last:1042");
    }
}
