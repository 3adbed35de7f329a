//! MQTT transport on rumqttc
//!
//! ## Connection lifecycle
//!
//! 1. [`MqttTransport::wait_connected`] polls until the first ConnAck. Failure or
//!    timeout here is fatal to startup.
//! 2. [`MqttTransport::run`] restores subscriptions and then dispatches every inbound
//!    publish to the manager.
//! 3. On every later ConnAck the subscriptions are restored again, since a clean
//!    session starts with none. Filters are batched into few SUBSCRIBE requests;
//!    whatever does not fit in the client's request queue is retried after the next
//!    poll. Connection errors back off exponentially; rumqttc
//!    reconnects on the next poll.

use crate::error::{IngestError, Result};
use crate::forwarder::TopicSubscriber;
use crate::metrics::IngestMetrics;
use crate::subscription::SubscriptionManager;
use ingest_config::BrokerConfig;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet as MqttPacket, QoS,
    SubscribeFilter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

/// Subscriptions and sensor frames both use QoS 1
const SUBSCRIBE_QOS: QoS = QoS::AtLeastOnce;

const BASE_RECONNECT_DELAY_MS: u64 = 100;
const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Queues subscribe requests on the client without waiting for the broker
#[derive(Clone, Debug)]
pub struct MqttSubscriber {
    client: AsyncClient,
}

impl MqttSubscriber {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl TopicSubscriber for MqttSubscriber {
    fn subscribe(&self, topic: &str) -> Result<()> {
        debug!(topic, "subscribing");
        self.client
            .try_subscribe(topic, SUBSCRIBE_QOS)
            .map_err(IngestError::from)
    }

    fn subscribe_many(&self, topics: &[String]) -> Result<()> {
        if topics.is_empty() {
            return Ok(());
        }
        debug!(filters = topics.len(), "subscribing");
        let filters = topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), SUBSCRIBE_QOS));
        self.client
            .try_subscribe_many(filters)
            .map_err(IngestError::from)
    }

    fn unsubscribe(&self, topic: &str) -> Result<()> {
        debug!(topic, "unsubscribing");
        self.client
            .try_unsubscribe(topic)
            .map_err(IngestError::from)
    }
}

/// Broker connection and its event loop
pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    config: BrokerConfig,
    metrics: Arc<IngestMetrics>,
}

impl MqttTransport {
    pub fn new(config: &BrokerConfig, metrics: Arc<IngestMetrics>) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, config.request_capacity);

        Self {
            client,
            eventloop,
            config: config.clone(),
            metrics,
        }
    }

    pub fn subscriber(&self) -> MqttSubscriber {
        MqttSubscriber::new(self.client.clone())
    }

    /// Drive the event loop until the broker acknowledges the session
    pub async fn wait_connected(&mut self, timeout: Duration) -> Result<()> {
        let host = self.config.host.clone();
        let port = self.config.port;
        info!("🔌 Connecting to MQTT broker at {}:{}", host, port);

        let handshake = async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Incoming(MqttPacket::ConnAck(ack))) => {
                        if ack.code == ConnectReturnCode::Success {
                            return Ok(());
                        }
                        return Err(IngestError::BrokerConnect {
                            host: host.clone(),
                            port,
                            reason: format!("{:?}", ack.code),
                        });
                    }
                    Ok(other) => trace!("pre-connect event: {:?}", other),
                    Err(e) => {
                        return Err(IngestError::BrokerConnect {
                            host: host.clone(),
                            port,
                            reason: e.to_string(),
                        })
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, handshake).await {
            Ok(Ok(())) => {
                IngestMetrics::incr(&self.metrics.broker_connects);
                self.metrics.set_broker_connected(true);
                info!("✅ Connected to MQTT broker at {}:{}", self.config.host, port);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(IngestError::Timeout {
                what: "MQTT broker ConnAck",
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Dispatch broker traffic until `shutdown` flips to true
    ///
    /// Hands the manager back so the caller can drain its workers.
    pub async fn run<S: TopicSubscriber>(
        mut self,
        mut manager: SubscriptionManager<S>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SubscriptionManager<S> {
        manager.resubscribe_all();
        let mut attempts: u32 = 0;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = self.eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(MqttPacket::Publish(publish))) => {
                            manager.handle_message(&publish.topic, &publish.payload);
                        }
                        Ok(Event::Incoming(MqttPacket::ConnAck(ack))) => {
                            attempts = 0;
                            IngestMetrics::incr(&self.metrics.broker_connects);
                            self.metrics.set_broker_connected(true);
                            info!(code = ?ack.code, "MQTT connected (or reconnected), restoring subscriptions");
                            manager.resubscribe_all();
                        }
                        Ok(event) => trace!("mqtt event: {:?}", event),
                        Err(e) => {
                            self.metrics.set_broker_connected(false);
                            attempts = attempts.saturating_add(1);
                            let delay_ms = reconnect_delay_ms(attempts);
                            warn!(
                                "⚠️ MQTT connection error (attempt {}), retrying in {}ms: {}",
                                attempts, delay_ms, e
                            );
                            sleep(Duration::from_millis(delay_ms)).await;
                        }
                    }
                    // Each poll frees request slots for subscriptions that did not fit
                    if manager.pending_subscriptions() > 0 {
                        manager.flush_pending_subscriptions();
                    }
                }
            }
        }

        info!("MQTT transport stopping");
        if let Err(e) = self.client.try_disconnect() {
            error!("Failed to queue MQTT disconnect: {}", e);
        }
        self.metrics.set_broker_connected(false);
        manager
    }
}

/// Exponential backoff capped at [`MAX_RECONNECT_DELAY_MS`]
fn reconnect_delay_ms(attempts: u32) -> u64 {
    let exponent = attempts.saturating_sub(1).min(16);
    (BASE_RECONNECT_DELAY_MS << exponent).min(MAX_RECONNECT_DELAY_MS)
}
