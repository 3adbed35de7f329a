//! Downstream contracts
//!
//! The pipeline talks to the outside world through these traits only. The gRPC
//! implementations live in [`crate::grpc`] and the MQTT one in [`crate::transport`];
//! tests plug in-process fakes into the same seams.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use types::{Batch, PresenceStatus, SensorId};

/// One open analysis stream, owned by a single worker
#[async_trait]
pub trait BatchSink: Send {
    /// Hand one batch to the analyzer
    async fn send(&mut self, batch: Batch) -> Result<()>;
}

/// Opens analysis streams
#[async_trait]
pub trait AnalysisClient: Send + Sync + 'static {
    /// Open the long-lived stream a worker reuses for every batch of `sensor`
    async fn open_stream(&self, sensor: SensorId) -> Result<Box<dyn BatchSink>>;

    /// Startup liveness probe against the analyzer
    async fn check_liveness(&self, timeout: Duration) -> Result<()>;
}

/// Reports presence transitions to the sensor directory
#[async_trait]
pub trait StatusReporter: Send + Sync + 'static {
    async fn update_status(&self, sensor: SensorId, status: PresenceStatus) -> Result<()>;
}

/// Topic subscriptions on the broker
///
/// Calls come from the transport task and must not wait on the broker.
pub trait TopicSubscriber: Send {
    fn subscribe(&self, topic: &str) -> Result<()>;

    /// Subscribe several filters as one request
    ///
    /// Either every filter is queued or none is.
    fn subscribe_many(&self, topics: &[String]) -> Result<()> {
        topics.iter().try_for_each(|topic| self.subscribe(topic))
    }

    fn unsubscribe(&self, topic: &str) -> Result<()>;
}
