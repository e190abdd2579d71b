//! Windowed history endpoint.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::events::HistoryPoint;
use crate::util::parse_duration;

const DEFAULT_RANGE: &str = "24h";

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Window literal such as `1h`, `30m` or `7d`.
    range: Option<String>,
}

/// GET /api/sensors/{id}/history?range=<duration>
///
/// A non-integer `{id}` is rejected by the path extractor with a 400 before
/// this handler runs. An unknown sensor or an empty window both return an
/// empty list, not an error.
pub async fn get_history(
    State(state): State<ApiState>,
    Path(sensor_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<HistoryPoint>>> {
    let range = query.range.as_deref().unwrap_or(DEFAULT_RANGE);

    let window = parse_duration(range).ok_or_else(|| {
        ApiError::InvalidRequest(format!(
            "invalid range {range:?}, expected a literal like 1h, 30m or 7d"
        ))
    })?;
    let window = chrono::Duration::from_std(window)
        .map_err(|_| ApiError::InvalidRequest(format!("range {range:?} is too large")))?;

    // window arithmetic in UTC, matching the stored timestamps
    let since = Utc::now() - window;

    let points = state.store.history_since(sensor_id, since).await?;
    Ok(Json(points))
}
