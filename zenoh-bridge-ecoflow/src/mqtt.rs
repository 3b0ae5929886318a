//! Broker transport: connection, subscription and the inbound event loop.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS, Transport};

use crate::cloud::BrokerCredentials;
use crate::commands::CommandTransport;
use crate::error::TransportError;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const CHANNEL_CAPACITY: usize = 64;

/// Telemetry topic of `serial`.
pub fn quota_topic(account: &str, serial: &str) -> String {
    format!("/open/{}/{}/quota", account, serial)
}

/// Connectivity topic of `serial`.
pub fn status_topic(account: &str, serial: &str) -> String {
    format!("/open/{}/{}/status", account, serial)
}

/// Client id unique per process: `<account>-<uuid>`.
pub fn client_id(account: &str) -> String {
    format!("{}-{}", account, uuid::Uuid::new_v4())
}

/// Connection options for `credentials`.
pub fn mqtt_options(credentials: &BrokerCredentials) -> Result<MqttOptions, TransportError> {
    if credentials.host.trim().is_empty() || credentials.port == 0 {
        return Err(TransportError::BrokerAddress(credentials.url()));
    }

    let mut options = MqttOptions::new(
        client_id(&credentials.username),
        credentials.host.trim(),
        credentials.port,
    );
    options.set_credentials(&credentials.username, &credentials.password);
    options.set_keep_alive(KEEP_ALIVE);
    options.set_clean_session(true);

    if credentials.uses_tls() {
        options.set_transport(Transport::tls_with_default_config());
    }

    Ok(options)
}

/// Outbound side of the broker connection.
#[derive(Clone, Debug)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl CommandTransport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }
}

/// An opened (not yet polled) broker connection.
pub struct BrokerConnection {
    transport: MqttTransport,
    event_loop: EventLoop,
    topics: Vec<String>,
}

impl BrokerConnection {
    /// Prepare a connection subscribing quota and status topics of `serials`.
    ///
    /// Nothing goes over the network until [`BrokerConnection::run`] polls.
    pub fn open(credentials: &BrokerCredentials, serials: &[String]) -> Result<Self, TransportError> {
        let options = mqtt_options(credentials)?;
        let (client, event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);

        let topics = serials
            .iter()
            .flat_map(|serial| {
                [
                    quota_topic(&credentials.username, serial),
                    status_topic(&credentials.username, serial),
                ]
            })
            .collect();

        Ok(Self {
            transport: MqttTransport { client },
            event_loop,
            topics,
        })
    }

    pub fn transport(&self) -> MqttTransport {
        self.transport.clone()
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Poll the connection forever, handing each inbound publish to `handle`.
    ///
    /// `handle` runs to completion before the next event is polled, so
    /// messages are processed one at a time in delivery order. Subscriptions
    /// are (re)issued on every connection acknowledgement.
    pub async fn run<H, Fut>(mut self, mut handle: H)
    where
        H: FnMut(Publish) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!(topics = self.topics.len(), "Connected to broker");
                    self.subscribe_all();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handle(publish).await;
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    tracing::warn!("Broker closed the connection");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, delay = ?RECONNECT_DELAY, "Broker connection error, reconnecting");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    fn subscribe_all(&self) {
        for topic in &self.topics {
            // Non-blocking: the event loop that drains requests is this task.
            if let Err(e) = self
                .transport
                .client
                .try_subscribe(topic.as_str(), QoS::AtLeastOnce)
            {
                tracing::warn!(topic = %topic, error = %e, "Failed to subscribe");
            }
        }
    }
}
