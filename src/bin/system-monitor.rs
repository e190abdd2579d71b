//! System monitor service.
//!
//! Periodically samples host metrics and publishes them as raw values on
//! the `/msh/system/*` topics, where the ingestor picks them up like any
//! other sensor.

use mesh_telemetry::broker::Broker;
use mesh_telemetry::config::MonitorConfig;
use mesh_telemetry::monitor::Monitor;
use mesh_telemetry::{logging, shutdown};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = MonitorConfig::from_env();
    let token = shutdown::shutdown_token();

    info!(interval = ?cfg.interval, "system monitor starting");

    // publish-only: the incoming stream stays unused
    let (broker, _messages) =
        Broker::connect(&cfg.mqtt_broker, &cfg.mqtt_client_id, token.clone()).await?;

    Monitor::new(broker.clone(), cfg.interval, cfg.process_filters)
        .run(token)
        .await;

    broker.disconnect().await;
    Ok(())
}
