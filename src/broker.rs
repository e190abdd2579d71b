//! MQTT broker client shared by all services.
//!
//! Thin wrapper around `rumqttc`: connecting yields a cloneable [`Broker`]
//! handle for publishing plus a [`MessageStream`] of incoming publishes. A
//! background task drives the protocol event loop; after the initial
//! connection has been confirmed, reconnects are the client library's job and
//! the driver simply keeps polling.
//!
//! Everything is QoS 0 (at most once), retained = false.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// How long the initial CONNACK may take before startup fails.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded drain window on disconnect.
const DISCONNECT_DRAIN: Duration = Duration::from_millis(250);

/// Incoming messages buffered between the event loop and the subscriber.
const STREAM_CAPACITY: usize = 256;

/// One message received from a subscription.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Receiving side of the subscription fan-in.
pub struct MessageStream {
    rx: mpsc::Receiver<IncomingMessage>,
}

impl MessageStream {
    /// Wait for the next message. `None` means the driver task has stopped.
    pub async fn recv(&mut self) -> Option<IncomingMessage> {
        self.rx.recv().await
    }
}

/// Cloneable publish handle.
#[derive(Clone)]
pub struct Broker {
    client: AsyncClient,
}

impl Broker {
    /// Connect to the broker and spawn the event-loop driver.
    ///
    /// Blocks until the broker acknowledges the connection; a broker that is
    /// unreachable at startup is a fatal error. The driver task exits when
    /// `token` is cancelled.
    pub async fn connect(
        url: &str,
        client_id: &str,
        token: CancellationToken,
    ) -> Result<(Broker, MessageStream)> {
        let (host, port) = parse_broker_addr(url)?;

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut eventloop) = AsyncClient::new(options, STREAM_CAPACITY);
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);

        // First phase: poll until CONNACK so startup failures surface here
        // instead of inside the driver task.
        let connack = tokio::time::timeout(CONNECT_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(e),
                }
            }
        })
        .await;

        match connack {
            Ok(Ok(())) => debug!(url, client_id, "connected to broker"),
            Ok(Err(e)) => bail!("broker connection to {url} failed: {e}"),
            Err(_) => bail!("broker connection to {url} timed out"),
        }

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("broker driver stopping");
                        break;
                    }
                    event = eventloop.poll() => match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let message = IncomingMessage {
                                topic: publish.topic.clone(),
                                payload: publish.payload.to_vec(),
                            };
                            // QoS 0: a full buffer drops the message.
                            if tx.try_send(message).is_err() {
                                warn!(topic = %publish.topic, "subscriber lagging, dropping message");
                            }
                        }
                        Ok(event) => trace!(?event, "broker event"),
                        Err(e) => {
                            // The client reconnects on its own; keep polling.
                            warn!("broker connection error: {e}");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        });

        Ok((Broker { client }, MessageStream { rx }))
    }

    /// Subscribe to a (possibly wildcarded) topic tree.
    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .with_context(|| format!("subscribe to {topic} failed"))
    }

    /// Publish and wait for the local enqueue to be confirmed.
    pub async fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.into())
            .await
            .with_context(|| format!("publish to {topic} failed"))
    }

    /// Fire-and-forget publish for the log path.
    ///
    /// Never waits, never errors; a full request queue simply drops the line.
    /// Waiting here could deadlock the logger against the very connection it
    /// logs through.
    pub fn try_publish(&self, topic: &str, payload: Vec<u8>) {
        let _ = self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload);
    }

    /// Disconnect with a bounded drain.
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("broker disconnect failed: {e}");
        }
        tokio::time::sleep(DISCONNECT_DRAIN).await;
    }
}

/// Accepts `mqtt://host:port`, `tcp://host:port` or a bare `host:port`;
/// the port defaults to 1883.
fn parse_broker_addr(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    if stripped.is_empty() {
        bail!("empty broker address");
    }

    match stripped.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid broker port in {url}"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((stripped.to_string(), 1883)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_prefixed_addresses() {
        assert_eq!(
            parse_broker_addr("mqtt://mosquitto:1883").unwrap(),
            ("mosquitto".to_string(), 1883)
        );
        assert_eq!(
            parse_broker_addr("tcp://10.0.0.7:2883").unwrap(),
            ("10.0.0.7".to_string(), 2883)
        );
    }

    #[test]
    fn bare_host_defaults_to_1883() {
        assert_eq!(
            parse_broker_addr("localhost").unwrap(),
            ("localhost".to_string(), 1883)
        );
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(parse_broker_addr("").is_err());
        assert!(parse_broker_addr("mqtt://host:notaport").is_err());
    }
}
