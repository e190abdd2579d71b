//! Catalog row type and startup schema application.
//!
//! The persister applies the schema once at startup (idempotent DDL); the
//! other services only assume it exists. Sensor rows themselves are seeded
//! administratively — the pipeline never mutates them. Note that the system
//! monitor's `/msh/system/*` topics need sensor rows like any other source,
//! or the ingestor drops those samples as unknown.

use sqlx::PgPool;
use tracing::{debug, info, warn};

use super::error::{StorageError, StorageResult};

/// One row of the active-sensor catalog join, before the live value is
/// attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRow {
    pub id: i64,
    pub topic: String,
    pub name: String,
    pub type_name: String,
    pub unit: String,
}

/// Create the tables the pipeline depends on (idempotent).
///
/// `sensor_data` is converted into a hypertable with one-day chunks when the
/// TimescaleDB extension is available; without the extension the plain table
/// still satisfies every query the pipeline issues.
pub async fn create_schema(pool: &PgPool) -> StorageResult<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_types (
            id        BIGSERIAL PRIMARY KEY,
            name      TEXT NOT NULL UNIQUE,
            unit      TEXT NOT NULL,
            min_value DOUBLE PRECISION,
            max_value DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            id             BIGSERIAL PRIMARY KEY,
            sensor_type_id BIGINT NOT NULL REFERENCES sensor_types (id),
            mqtt_topic     TEXT NOT NULL UNIQUE,
            friendly_name  TEXT NOT NULL,
            is_active      BOOLEAN NOT NULL DEFAULT TRUE
        );
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_data (
            time      TIMESTAMPTZ NOT NULL,
            sensor_id BIGINT NOT NULL,
            value     DOUBLE PRECISION NOT NULL,
            PRIMARY KEY (time, sensor_id)
        );
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;

    // Best effort: requires the timescaledb extension.
    match sqlx::query(
        "SELECT create_hypertable('sensor_data', 'time', \
         chunk_time_interval => INTERVAL '1 day', if_not_exists => TRUE)",
    )
    .execute(pool)
    .await
    {
        Ok(_) => debug!("sensor_data hypertable ready"),
        Err(e) => warn!("hypertable setup skipped (plain table remains usable): {e}"),
    }

    info!("database schema ready");
    Ok(())
}
