//! # Subscription Manager
//!
//! Turns broker traffic into registry changes, worker starts and queue sends.
//!
//! Every method runs on the single transport task and none of them waits: subscribe
//! requests are queued on the MQTT client, status updates are queued for the
//! propagator, and packets are handed to workers with `try_send`.
//!
//! ## Presence
//!
//! - `online`: register the sensor if absent and start a worker for a new queue, then
//!   subscribe its audio topic. The subscribe is repeated on a duplicate `online`; the
//!   broker treats it as the same subscription.
//! - `offline`: unregister, apply the [`WorkerRetention`] policy to the removed queue,
//!   unsubscribe.
//!
//! Both cases queue the transition for the gateway.
//!
//! ## Subscriptions
//!
//! The MQTT client's request queue is bounded and only drains while the transport
//! task polls, which is the task calling into the manager. Filters that do not fit
//! are kept pending and retried by [`SubscriptionManager::flush_pending_subscriptions`]
//! after the next poll, so a reconnect with many online sensors loses none of them.
//!
//! ## Audio
//!
//! Decode, look up, `try_send`. Malformed frames, unknown sensors, full queues and
//! closed queues are each logged, counted and dropped.

use crate::forwarder::{AnalysisClient, TopicSubscriber};
use crate::metrics::IngestMetrics;
use crate::registry::{PacketSender, Registration, SensorRegistry};
use crate::status::StatusHandle;
use crate::worker::{StreamWorker, WorkerSummary};
use codec::{decode_packet, decode_presence, TopicKind, TopicLayout};
use ingest_config::{PipelineConfig, WorkerRetention};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Upper bound on filters carried by one SUBSCRIBE request
pub const MAX_FILTERS_PER_SUBSCRIBE: usize = 64;
use types::{PresenceEvent, PresenceStatus, SensorId};

/// Batching and lifecycle settings for the workers a manager starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub batch_threshold_bytes: usize,
    pub worker_retention: WorkerRetention,
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            batch_threshold_bytes: config.batch_threshold_bytes(),
            worker_retention: config.worker_retention,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// What happened to one audio frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOutcome {
    Queued,
    DecodeFailed,
    UnknownSensor,
    QueueFull,
    QueueClosed,
}

/// What a presence event changed locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// New registry entry and a new worker
    WorkerStarted,
    /// Sensor was already registered; only the subscription was repeated
    AlreadyOnline,
    /// Registry entry removed
    Removed,
    /// `offline` for a sensor that was not registered
    NotRegistered,
}

/// A worker task started by the manager
#[derive(Debug)]
pub struct WorkerHandle {
    pub sensor: SensorId,
    pub handle: JoinHandle<WorkerSummary>,
}

/// Reacts to presence and audio traffic
pub struct SubscriptionManager<S: TopicSubscriber> {
    layout: TopicLayout,
    registry: Arc<SensorRegistry>,
    client: Arc<dyn AnalysisClient>,
    subscriber: S,
    status: StatusHandle,
    metrics: Arc<IngestMetrics>,
    options: PipelineOptions,
    /// Queues of offline sensors kept open under [`WorkerRetention::Linger`]
    retired: Vec<(SensorId, PacketSender)>,
    workers: Vec<WorkerHandle>,
    /// Filters waiting for room in the client's request queue
    pending: Vec<String>,
}

impl<S: TopicSubscriber> SubscriptionManager<S> {
    pub fn new(
        layout: TopicLayout,
        registry: Arc<SensorRegistry>,
        client: Arc<dyn AnalysisClient>,
        subscriber: S,
        status: StatusHandle,
        metrics: Arc<IngestMetrics>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            layout,
            registry,
            client,
            subscriber,
            status,
            metrics,
            options,
            retired: Vec::new(),
            workers: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn layout(&self) -> &TopicLayout {
        &self.layout
    }

    pub fn subscriber(&self) -> &S {
        &self.subscriber
    }

    /// Queues held open for offline sensors
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Filters not yet accepted by the client
    pub fn pending_subscriptions(&self) -> usize {
        self.pending.len()
    }

    /// Route one inbound broker message
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) {
        match self.layout.classify(topic) {
            Ok(TopicKind::Audio(sensor)) => {
                self.handle_audio(sensor, payload);
            }
            Ok(TopicKind::Presence) => {
                self.handle_presence(topic, payload);
            }
            Err(e) => {
                IngestMetrics::incr(&self.metrics.decode_failures);
                warn!(topic = %topic, "ignoring message: {}", e);
            }
        }
    }

    /// Decode and apply a presence frame
    pub fn handle_presence(&mut self, topic: &str, payload: &[u8]) -> Option<PresenceOutcome> {
        match decode_presence(topic, payload) {
            Ok(event) => Some(self.apply_presence(event)),
            Err(e) => {
                IngestMetrics::incr(&self.metrics.decode_failures);
                warn!(topic = %topic, "invalid presence message: {}", e);
                None
            }
        }
    }

    pub fn apply_presence(&mut self, event: PresenceEvent) -> PresenceOutcome {
        self.workers.retain(|w| !w.handle.is_finished());

        let outcome = match event.status {
            PresenceStatus::Online => self.sensor_online(event.sensor),
            PresenceStatus::Offline => self.sensor_offline(event.sensor),
        };

        self.status.report(event.sensor, event.status);
        outcome
    }

    fn sensor_online(&mut self, sensor: SensorId) -> PresenceOutcome {
        let outcome = match self.registry.register_if_absent(sensor) {
            Registration::Created { inbox, .. } => {
                info!(%sensor, "sensor connected");
                let worker = StreamWorker::new(
                    sensor,
                    inbox,
                    self.options.batch_threshold_bytes,
                    Arc::clone(&self.client),
                    Arc::clone(&self.metrics),
                );
                self.workers.push(WorkerHandle {
                    sensor,
                    handle: worker.spawn(),
                });
                PresenceOutcome::WorkerStarted
            }
            Registration::Existing { .. } => {
                debug!(%sensor, "duplicate online, already registered");
                PresenceOutcome::AlreadyOnline
            }
        };

        let topic = self.layout.audio_topic(sensor);
        if let Err(e) = self.subscriber.subscribe(&topic) {
            warn!(%sensor, topic = %topic, "subscribe deferred: {}", e);
            if !self.pending.contains(&topic) {
                self.pending.push(topic);
            }
        }

        outcome
    }

    fn sensor_offline(&mut self, sensor: SensorId) -> PresenceOutcome {
        let outcome = match self.registry.unregister(sensor) {
            Some(queue) => {
                info!(%sensor, "sensor disconnected");
                match self.options.worker_retention {
                    WorkerRetention::Linger => self.retired.push((sensor, queue)),
                    WorkerRetention::Close => drop(queue),
                }
                PresenceOutcome::Removed
            }
            None => {
                debug!(%sensor, "offline for unregistered sensor");
                PresenceOutcome::NotRegistered
            }
        };

        let topic = self.layout.audio_topic(sensor);
        self.pending.retain(|pending| pending != &topic);
        if let Err(e) = self.subscriber.unsubscribe(&topic) {
            warn!(%sensor, topic = %topic, "unsubscribe failed: {}", e);
        }

        outcome
    }

    /// Decode one audio frame and hand it to the sensor's worker without waiting
    pub fn handle_audio(&self, sensor: SensorId, payload: &[u8]) -> AudioOutcome {
        IngestMetrics::incr(&self.metrics.packets_received);

        let packet = match decode_packet(payload) {
            Ok(packet) => packet,
            Err(e) => {
                IngestMetrics::incr(&self.metrics.decode_failures);
                warn!(%sensor, "invalid payload: {}", e);
                return AudioOutcome::DecodeFailed;
            }
        };

        let Some(queue) = self.registry.lookup(sensor) else {
            IngestMetrics::incr(&self.metrics.unknown_sensor_drops);
            info!(%sensor, sequence = packet.sequence, "stream not found, dropping packet");
            return AudioOutcome::UnknownSensor;
        };

        match queue.try_send(packet) {
            Ok(()) => AudioOutcome::Queued,
            Err(TrySendError::Full(packet)) => {
                IngestMetrics::incr(&self.metrics.overload_drops);
                warn!(%sensor, sequence = packet.sequence, "dropping packet (stream too slow)");
                AudioOutcome::QueueFull
            }
            Err(TrySendError::Closed(packet)) => {
                IngestMetrics::incr(&self.metrics.closed_queue_drops);
                warn!(%sensor, sequence = packet.sequence, "stream handler gone, dropping packet");
                AudioOutcome::QueueClosed
            }
        }
    }

    /// Restore every subscription after the broker (re)acknowledged the session
    pub fn resubscribe_all(&mut self) {
        let sensors = self.registry.sensors();
        let mut topics = Vec::with_capacity(sensors.len() + 1);
        topics.push(self.layout.presence_filter());
        topics.extend(sensors.iter().map(|sensor| self.layout.audio_topic(*sensor)));

        // A fresh session has none of the old subscriptions, pending ones included
        self.pending = topics;
        let remaining = self.flush_pending_subscriptions();
        info!(sensors = sensors.len(), remaining, "subscriptions restored");
    }

    /// Queue pending filters in chunks until the client refuses one
    ///
    /// Returns how many filters are still pending.
    pub fn flush_pending_subscriptions(&mut self) -> usize {
        while !self.pending.is_empty() {
            let chunk = self.pending.len().min(MAX_FILTERS_PER_SUBSCRIBE);
            match self.subscriber.subscribe_many(&self.pending[..chunk]) {
                Ok(()) => {
                    self.pending.drain(..chunk);
                }
                Err(e) => {
                    debug!(pending = self.pending.len(), "subscribe request queue full: {}", e);
                    break;
                }
            }
        }
        self.pending.len()
    }

    /// Close every queue and hand back the worker tasks so the caller can await them
    pub fn drain(&mut self) -> Vec<WorkerHandle> {
        for sensor in self.registry.sensors() {
            let _ = self.registry.unregister(sensor);
        }
        self.retired.clear();
        self.pending.clear();
        std::mem::take(&mut self.workers)
    }
}
