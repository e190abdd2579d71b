//! Log collector: broker log topics → per-service files.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Appends each log message to `<log_dir>/<service>.log`.
pub struct LogCollector {
    log_dir: PathBuf,
}

impl LogCollector {
    /// Create the collector, ensuring the output directory exists.
    pub fn new(log_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let log_dir = log_dir.into();
        std::fs::create_dir_all(&log_dir)?;
        Ok(Self { log_dir })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Extract the service name from a `logs/<service>/...` topic.
    ///
    /// Topics with fewer than two segments are rejected, as are segment
    /// values that would escape the log directory.
    pub fn service_from_topic(topic: &str) -> Option<&str> {
        let mut parts = topic.split('/');
        let _prefix = parts.next()?;
        let service = parts.next()?;

        if service.is_empty() || service == "." || service == ".." {
            return None;
        }
        Some(service)
    }

    /// Open-append-close one message, with a trailing newline.
    ///
    /// Reopening per message keeps external log rotation safe.
    pub async fn append(&self, service: &str, payload: &[u8]) -> std::io::Result<()> {
        let path = self.log_dir.join(format!("{service}.log"));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        file.write_all(payload).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }

    /// Per-message path: parse, append, and isolate failures to this message.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) {
        let Some(service) = Self::service_from_topic(topic) else {
            warn!(topic, "ignoring log message with unusable topic");
            return;
        };

        if let Err(e) = self.append(service, payload).await {
            warn!(service, "failed to append log line: {e}");
        }
    }
}
