//! Postgres/TimescaleDB implementation of [`TimeSeriesRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use super::error::{StorageError, StorageResult};
use super::schema::SensorRow;
use super::TimeSeriesRepository;
use crate::events::{HistoryPoint, MetadataEntry, SensorEvent};

/// Connection-pooled time-series store.
///
/// The pool is concurrency-safe; each call borrows one connection for the
/// duration of a single query. Cloning shares the pool.
#[derive(Clone)]
pub struct TimeSeriesStore {
    pool: PgPool,
}

impl TimeSeriesStore {
    /// Connect and verify the store is reachable.
    #[instrument(skip_all)]
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!("connected to time-series store");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TimeSeriesRepository for TimeSeriesStore {
    async fn insert_measurement(&self, event: &SensorEvent) -> StorageResult<()> {
        let result = sqlx::query("INSERT INTO sensor_data (time, sensor_id, value) VALUES ($1, $2, $3)")
            .bind(event.timestamp)
            .bind(event.sensor_id)
            .bind(event.value)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.as_database_error().is_some_and(|db| db.is_unique_violation()) => {
                Err(StorageError::DuplicateRow {
                    sensor_id: event.sensor_id,
                })
            }
            Err(e) => Err(StorageError::QueryFailed(e.to_string())),
        }
    }

    async fn load_sensor_metadata(&self) -> StorageResult<Vec<(String, MetadataEntry)>> {
        let rows = sqlx::query_as::<_, (String, i64, Option<f64>, Option<f64>)>(
            r#"
            SELECT s.mqtt_topic, s.id, st.min_value, st.max_value
            FROM sensors s
            JOIN sensor_types st ON s.sensor_type_id = st.id
            WHERE s.is_active = TRUE
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        debug!("loaded metadata for {} sensors", rows.len());

        Ok(rows
            .into_iter()
            .map(|(topic, sensor_id, min_value, max_value)| {
                (
                    topic,
                    MetadataEntry {
                        sensor_id,
                        min_value,
                        max_value,
                    },
                )
            })
            .collect())
    }

    async fn list_active_sensors(&self) -> StorageResult<Vec<SensorRow>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String)>(
            r#"
            SELECT s.id, s.mqtt_topic, s.friendly_name, st.name, st.unit
            FROM sensors s
            JOIN sensor_types st ON s.sensor_type_id = st.id
            WHERE s.is_active = TRUE
            ORDER BY s.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(id, topic, name, type_name, unit)| SensorRow {
                id,
                topic,
                name,
                type_name,
                unit,
            })
            .collect())
    }

    async fn history_since(
        &self,
        sensor_id: i64,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HistoryPoint>> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>, f64)>(
            r#"
            SELECT time, value
            FROM sensor_data
            WHERE sensor_id = $1 AND time >= $2
            ORDER BY time ASC
            "#,
        )
        .bind(sensor_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(time, value)| HistoryPoint { time, value })
            .collect())
    }

    async fn close(&self) {
        debug!("closing time-series store");
        self.pool.close().await;
    }
}
