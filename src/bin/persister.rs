//! Data persister service.
//!
//! Consumes normalized events and performs the dual write: append to the
//! time-series store, overwrite the last-value cache.

use std::sync::Arc;

use mesh_telemetry::broker::Broker;
use mesh_telemetry::config::PersisterConfig;
use mesh_telemetry::persist::Persister;
use mesh_telemetry::storage::{schema, LastValueCache, TimeSeriesRepository, TimeSeriesStore};
use mesh_telemetry::{logging, shutdown};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = PersisterConfig::from_env();
    let token = shutdown::shutdown_token();

    info!(input = %cfg.input_topic, "data persister starting");

    let store = TimeSeriesStore::connect(&cfg.postgres_url).await?;
    schema::create_schema(store.pool()).await?;

    let cache = LastValueCache::connect(&cfg.valkey_addr).await?;
    info!("stores connected");

    let store: Arc<dyn TimeSeriesRepository> = Arc::new(store);
    let persister = Persister::new(store.clone(), Arc::new(cache));

    let (broker, mut messages) =
        Broker::connect(&cfg.mqtt_broker, &cfg.mqtt_client_id, token.clone()).await?;
    broker.subscribe(&cfg.input_topic).await?;
    info!(topic = %cfg.input_topic, "listening for normalized events");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            message = messages.recv() => {
                let Some(message) = message else {
                    warn!("broker message stream closed");
                    break;
                };
                persister.handle_message(&message.payload).await;
            }
        }
    }

    info!("data persister shutting down");
    broker.disconnect().await;
    store.close().await;
    Ok(())
}
