//! Property-based tests for pipeline invariants using proptest
//!
//! These verify that for all inputs:
//! - the ingestor emits an event exactly when the value satisfies the bounds
//! - the duration-literal parser is total (never panics) and exact
//! - normalized events survive a serialize/deserialize round trip

use std::collections::HashMap;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use mesh_telemetry::events::{MetadataEntry, SensorEvent};
use mesh_telemetry::ingest::{process_message, MetadataCache, ProcessError};
use mesh_telemetry::util::parse_duration;
use proptest::prelude::*;

fn cache_with_bounds(min: Option<f64>, max: Option<f64>) -> MetadataCache {
    let cache = MetadataCache::new();
    cache.replace(HashMap::from([(
        "/msh/prop/test".to_string(),
        MetadataEntry {
            sensor_id: 1,
            min_value: min,
            max_value: max,
        },
    )]));
    cache
}

proptest! {
    // An event is produced iff (lo absent ∨ v ≥ lo) ∧ (hi absent ∨ v ≤ hi).
    #[test]
    fn prop_event_iff_value_within_bounds(
        value in -1.0e6f64..1.0e6f64,
        min in proptest::option::of(-1.0e6f64..1.0e6f64),
        max in proptest::option::of(-1.0e6f64..1.0e6f64),
    ) {
        let cache = cache_with_bounds(min, max);
        let payload = value.to_string();

        let result = process_message("/msh/prop/test", payload.as_bytes(), &cache);

        let expected_ok = min.is_none_or(|lo| value >= lo) && max.is_none_or(|hi| value <= hi);
        prop_assert_eq!(result.is_ok(), expected_ok);

        if let Err(err) = result {
            prop_assert!(matches!(err, ProcessError::OutOfRange { .. }), "expected OutOfRange error");
        }
    }
}

proptest! {
    // Accepted values round-trip exactly through the decimal payload.
    #[test]
    fn prop_accepted_value_is_exact(value in -1.0e6f64..1.0e6f64) {
        let cache = cache_with_bounds(None, None);
        let payload = value.to_string();

        let event = process_message("/msh/prop/test", payload.as_bytes(), &cache).unwrap();
        prop_assert_eq!(event.value, value);
        prop_assert_eq!(event.sensor_id, 1);
    }
}

proptest! {
    // A topic outside the cache never produces an event, whatever the payload.
    #[test]
    fn prop_unknown_topic_never_emits(payload in ".{0,32}") {
        let cache = MetadataCache::new();

        let result = process_message("/msh/not/registered", payload.as_bytes(), &cache);
        prop_assert!(matches!(result, Err(ProcessError::UnknownTopic { .. })), "expected UnknownTopic error");
    }
}

proptest! {
    #[test]
    fn prop_duration_parser_is_exact(amount in 1u64..10_000u64) {
        prop_assert_eq!(
            parse_duration(&format!("{amount}s")),
            Some(Duration::from_secs(amount))
        );
        prop_assert_eq!(
            parse_duration(&format!("{amount}m")),
            Some(Duration::from_secs(amount * 60))
        );
        prop_assert_eq!(
            parse_duration(&format!("{amount}h")),
            Some(Duration::from_secs(amount * 3600))
        );
        prop_assert_eq!(
            parse_duration(&format!("{amount}d")),
            Some(Duration::from_secs(amount * 86_400))
        );
    }
}

proptest! {
    // Total over arbitrary input: may reject, must not panic.
    #[test]
    fn prop_duration_parser_never_panics(input in ".{0,16}") {
        let _ = parse_duration(&input);
    }
}

proptest! {
    #[test]
    fn prop_event_serde_round_trip(
        sensor_id in 1i64..1_000_000i64,
        value in -1.0e9f64..1.0e9f64,
        secs in 0i64..4_000_000_000i64,
    ) {
        let event = SensorEvent {
            sensor_id,
            value,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        };

        let json = serde_json::to_vec(&event).unwrap();
        let back: SensorEvent = serde_json::from_slice(&json).unwrap();
        prop_assert_eq!(back, event);
    }
}
