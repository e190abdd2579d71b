//! Per-message processing: topic resolution, decoding and range validation.

use std::fmt;

use chrono::Utc;

use super::metadata::MetadataCache;
use crate::events::SensorEvent;

/// Why a raw message was dropped instead of producing an event.
///
/// Every variant is a warning at the call site; none of them stop the
/// subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessError {
    /// The topic has no entry in the metadata cache. Dropping here is what
    /// keeps every persisted row pointing at an existing sensor.
    UnknownTopic { topic: String },

    /// The payload is not a decimal floating-point number.
    MalformedValue { payload: String },

    /// The value falls outside the sensor type's `[min, max]`.
    OutOfRange {
        sensor_id: i64,
        value: f64,
        min_value: Option<f64>,
        max_value: Option<f64>,
    },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::UnknownTopic { topic } => {
                write!(f, "unknown topic (no matching sensor): {}", topic)
            }
            ProcessError::MalformedValue { payload } => {
                write!(f, "payload is not a number: {:?}", payload)
            }
            ProcessError::OutOfRange {
                sensor_id,
                value,
                min_value,
                max_value,
            } => write!(
                f,
                "value {} outside [{}, {}] for sensor {}",
                value,
                min_value.map_or("-inf".to_string(), |v| v.to_string()),
                max_value.map_or("+inf".to_string(), |v| v.to_string()),
                sensor_id
            ),
        }
    }
}

impl std::error::Error for ProcessError {}

/// Turn one raw broker message into a normalized event, or say why not.
///
/// The steps, in order:
/// 1. resolve the topic against the cache,
/// 2. decode the payload as a decimal float (trimmed; non-finite rejected),
/// 3. check the bounds that are present — values exactly on a bound pass,
/// 4. stamp the event with the resolved sensor id and the current UTC time.
///
/// No I/O happens here; the caller publishes the event (or logs the error).
pub fn process_message(
    topic: &str,
    payload: &[u8],
    cache: &MetadataCache,
) -> Result<SensorEvent, ProcessError> {
    let Some(meta) = cache.lookup(topic) else {
        return Err(ProcessError::UnknownTopic {
            topic: topic.to_string(),
        });
    };

    let text = String::from_utf8_lossy(payload);
    let trimmed = text.trim();

    let value: f64 = match trimmed.parse() {
        Ok(value) => value,
        Err(_) => {
            return Err(ProcessError::MalformedValue {
                payload: trimmed.to_string(),
            })
        }
    };

    // "NaN" and "inf" parse as floats but defeat both the range check and
    // the store's numeric column, so they count as malformed.
    if !value.is_finite() {
        return Err(ProcessError::MalformedValue {
            payload: trimmed.to_string(),
        });
    }

    let below = meta.min_value.is_some_and(|min| value < min);
    let above = meta.max_value.is_some_and(|max| value > max);
    if below || above {
        return Err(ProcessError::OutOfRange {
            sensor_id: meta.sensor_id,
            value,
            min_value: meta.min_value,
            max_value: meta.max_value,
        });
    }

    Ok(SensorEvent {
        sensor_id: meta.sensor_id,
        value,
        timestamp: Utc::now(),
    })
}
