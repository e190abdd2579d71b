//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur against either store
#[derive(Debug)]
pub enum StorageError {
    /// Store unreachable (startup ping or pool construction failed)
    ConnectionFailed(String),

    /// A query against the time-series store failed
    QueryFailed(String),

    /// Insert hit the `(time, sensor_id)` primary key
    DuplicateRow { sensor_id: i64 },

    /// Startup schema application failed
    SchemaFailed(String),

    /// The last-value cache returned an error
    CacheFailed(String),

    /// The per-operation deadline elapsed
    Timeout,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to store: {}", msg)
            }
            StorageError::QueryFailed(msg) => write!(f, "storage query failed: {}", msg),
            StorageError::DuplicateRow { sensor_id } => {
                write!(f, "duplicate measurement for sensor {}", sensor_id)
            }
            StorageError::SchemaFailed(msg) => write!(f, "schema setup failed: {}", msg),
            StorageError::CacheFailed(msg) => write!(f, "last-value cache error: {}", msg),
            StorageError::Timeout => write!(f, "storage operation timed out"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::CacheFailed(err.to_string())
    }
}
