//! Read API service.
//!
//! Serves the sensor catalog joined with live values, windowed history and
//! a health probe.

use std::sync::Arc;

use mesh_telemetry::api::{self, ApiState};
use mesh_telemetry::config::ApiConfig;
use mesh_telemetry::storage::{LastValueCache, TimeSeriesRepository, TimeSeriesStore};
use mesh_telemetry::{logging, shutdown};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = ApiConfig::from_env();
    let token = shutdown::shutdown_token();

    info!(port = cfg.http_port, "home API starting");

    let store: Arc<dyn TimeSeriesRepository> =
        Arc::new(TimeSeriesStore::connect(&cfg.postgres_url).await?);
    let cache = Arc::new(LastValueCache::connect(&cfg.valkey_addr).await?);

    let state = ApiState::new(store.clone(), cache);
    api::spawn_api_server(cfg.http_port, state, token.clone()).await?;

    token.cancelled().await;

    info!("home API shutting down");
    store.close().await;
    Ok(())
}
