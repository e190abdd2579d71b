//! Tracing setup, including the broker-backed log tee used by the ingestor.
//!
//! The ingestor publishes its own log lines on `logs/<service>` so the log
//! collector can archive them. That path must never block or feed back into
//! itself, so the writer copies each formatted line into an unbounded channel
//! and a forwarder task hands the copies to [`Broker::try_publish`]. Every
//! line is also written to stdout, which keeps broker outages diagnosable.

use std::io::{self, Write};

use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::broker::Broker;

/// Initialize stdout-only logging.
///
/// `RUST_LOG` wins if set; otherwise `LOG_LEVEL` (default "info") applies to
/// the crate while chatty dependencies stay at warn.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .compact()
        .init();
}

/// Initialize logging that tees every line to stdout and the broker.
///
/// Must be called after the broker connection is established; failures before
/// that point surface on stderr via the binary's error path.
pub fn init_with_broker(broker: &Broker, service_name: &str) {
    let tee = BrokerLogTee::new(broker.clone(), service_name);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_ansi(false)
        .with_writer(tee)
        .compact()
        .init();
}

fn env_filter() -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = crate::util::env_or("LOG_LEVEL", "info");
        EnvFilter::new(format!("{level},rumqttc=warn,sqlx=warn,hyper=warn"))
    }
}

/// `MakeWriter` that duplicates formatted log lines to stdout and a broker
/// topic.
pub struct BrokerLogTee {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl BrokerLogTee {
    /// Spawn the forwarder task and return the writer factory.
    ///
    /// Lines are published on `logs/<service_name>`.
    pub fn new(broker: Broker, service_name: &str) -> Self {
        let topic = format!("logs/{service_name}");
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                broker.try_publish(&topic, line);
            }
        });

        Self { tx }
    }
}

impl<'a> MakeWriter<'a> for BrokerLogTee {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriter {
            tx: self.tx.clone(),
        }
    }
}

/// Per-event writer handed out by [`BrokerLogTee`].
pub struct TeeWriter {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        // The subscriber reuses its formatting buffer; the channel gets a copy.
        let _ = self.tx.send(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tee_writer_copies_the_buffer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut writer = TeeWriter { tx };

        let mut line = b"hello".to_vec();
        writer.write_all(&line).unwrap();

        // Mutating the original afterwards must not affect the queued copy.
        line[0] = b'X';

        let sent = rx.recv().await.unwrap();
        assert_eq!(sent, b"hello");
    }
}
