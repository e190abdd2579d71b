//! Log collector service.
//!
//! Subscribes to the log topic tree and appends every message to the
//! matching per-service file.

use anyhow::Context;
use mesh_telemetry::broker::Broker;
use mesh_telemetry::collect::LogCollector;
use mesh_telemetry::config::CollectorConfig;
use mesh_telemetry::{logging, shutdown};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = CollectorConfig::from_env();
    let token = shutdown::shutdown_token();

    info!(dir = %cfg.log_dir, "log collector starting");

    let collector = LogCollector::new(&cfg.log_dir)
        .with_context(|| format!("cannot prepare log directory {}", cfg.log_dir))?;

    let (broker, mut messages) =
        Broker::connect(&cfg.mqtt_broker, &cfg.mqtt_client_id, token.clone()).await?;
    broker.subscribe(&cfg.log_topic).await?;
    info!(topic = %cfg.log_topic, "listening for service logs");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            message = messages.recv() => {
                let Some(message) = message else {
                    warn!("broker message stream closed");
                    break;
                };
                collector.handle_message(&message.topic, &message.payload).await;
            }
        }
    }

    info!("log collector shutting down");
    broker.disconnect().await;
    Ok(())
}
