//! Sensor ingestor service.
//!
//! Subscribes to the raw sensor topic tree, validates each reading against
//! the cached sensor catalog and republishes it as a normalized event.

use std::sync::Arc;

use anyhow::Context;
use mesh_telemetry::broker::Broker;
use mesh_telemetry::config::IngestorConfig;
use mesh_telemetry::ingest::{process_message, MetadataCache, MetadataService};
use mesh_telemetry::storage::{TimeSeriesRepository, TimeSeriesStore};
use mesh_telemetry::{api, logging, shutdown};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = IngestorConfig::from_env();
    let token = shutdown::shutdown_token();

    // The logger publishes through the broker, so the connection has to
    // exist first. Anything failing before this point reaches stderr
    // through the error return.
    let (broker, mut messages) =
        Broker::connect(&cfg.mqtt_broker, &cfg.mqtt_client_id, token.clone()).await?;

    logging::init_with_broker(&broker, "sensor-ingestor");
    info!(
        input = %cfg.input_topic,
        output = %cfg.output_topic,
        "sensor ingestor starting"
    );

    let store: Arc<dyn TimeSeriesRepository> =
        Arc::new(TimeSeriesStore::connect(&cfg.postgres_url).await?);

    let cache = Arc::new(MetadataCache::new());
    let metadata = MetadataService::new(store.clone(), cache.clone());

    // Without a populated cache every message would be dropped as unknown,
    // so the first load blocks startup and its failure aborts it.
    metadata
        .refresh()
        .await
        .context("initial sensor metadata load failed")?;
    let refresh_task = tokio::spawn(metadata.run_refresh_loop(token.child_token()));

    api::spawn_health_listener(cfg.http_port, token.clone()).await?;

    broker.subscribe(&cfg.input_topic).await?;
    info!(topic = %cfg.input_topic, "listening for raw sensor readings");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            message = messages.recv() => {
                let Some(message) = message else {
                    warn!("broker message stream closed");
                    break;
                };

                match process_message(&message.topic, &message.payload, &cache) {
                    Ok(event) => match serde_json::to_vec(&event) {
                        Ok(payload) => {
                            if let Err(e) = broker.publish(&cfg.output_topic, payload).await {
                                error!("failed to publish normalized event: {e}");
                            }
                        }
                        Err(e) => error!("failed to serialize event: {e}"),
                    },
                    Err(reason) => {
                        warn!(topic = %message.topic, %reason, "message dropped");
                    }
                }
            }
        }
    }

    info!("sensor ingestor shutting down");
    token.cancel();
    let _ = refresh_task.await;
    broker.disconnect().await;
    store.close().await;
    Ok(())
}
