//! Sensor catalog endpoint with the live-value join.

use axum::extract::State;
use axum::Json;
use tracing::warn;

use crate::api::error::ApiResult;
use crate::api::state::ApiState;
use crate::events::SensorView;

/// GET /api/sensors
///
/// Lists all active sensors, each joined with its cached last value. A cache
/// miss, a cache transport error and an unparsable cached string all
/// degrade to `current_value: null` — the catalog itself still renders.
pub async fn list_sensors(State(state): State<ApiState>) -> ApiResult<Json<Vec<SensorView>>> {
    let rows = state.store.list_active_sensors().await?;

    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let current_value = match state.cache.fetch_last(row.id).await {
            Ok(Some(raw)) => match raw.parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(sensor_id = row.id, cached = %raw, "unparsable cached value");
                    None
                }
            },
            // no cached entry: the sensor has not reported within the lease
            Ok(None) => None,
            Err(e) => {
                warn!(sensor_id = row.id, "last-value lookup failed: {e}");
                None
            }
        };

        views.push(SensorView {
            id: row.id,
            topic: row.topic,
            name: row.name,
            type_name: row.type_name,
            unit: row.unit,
            current_value,
        });
    }

    Ok(Json(views))
}
