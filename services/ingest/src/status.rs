//! Status Propagator
//!
//! Presence transitions are reported to the gateway from a dedicated task fed by a
//! bounded queue. The transport task only ever `try_send`s into that queue, so a slow
//! gateway can never stall packet delivery, and one sensor's transitions reach the
//! gateway in the order they were observed.
//!
//! Reporting is fire-and-forget. Local registry changes have already happened by the
//! time an update is queued; failures are logged and counted, never retried or rolled
//! back.
//!
//! ## Overflow
//!
//! When the queue is full a transition goes to a backlog that keeps only the latest
//! status per sensor. While a sensor has a backlog entry its newer transitions
//! overwrite that entry instead of entering the queue, and the propagator only
//! delivers the backlog once the queue is empty. The gateway may miss intermediate
//! transitions during a burst, but always ends up with each sensor's final status.

use crate::forwarder::StatusReporter;
use crate::metrics::IngestMetrics;
use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;
use tokio::sync::mpsc::{
    self,
    error::{TryRecvError, TrySendError},
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use types::{PresenceStatus, SensorId};

/// One transition waiting for the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub sensor: SensorId,
    pub status: PresenceStatus,
}

/// Latest overflowed status per sensor, in first-overflow order
type Backlog = Arc<Mutex<Vec<StatusUpdate>>>;

/// Producer side, held by the subscription manager
#[derive(Debug, Clone)]
pub struct StatusHandle {
    tx: mpsc::Sender<StatusUpdate>,
    backlog: Backlog,
    metrics: Arc<IngestMetrics>,
}

impl StatusHandle {
    /// Queue a transition without waiting
    ///
    /// Returns false only when the propagator has stopped. A full queue moves the
    /// transition to the backlog, superseding any older backlog entry for the sensor.
    pub fn report(&self, sensor: SensorId, status: PresenceStatus) -> bool {
        let update = StatusUpdate { sensor, status };
        let mut backlog = self.backlog.lock();

        if let Some(entry) = backlog.iter_mut().find(|entry| entry.sensor == sensor) {
            IngestMetrics::incr(&self.metrics.status_drops);
            debug!(%sensor, %status, superseded = %entry.status, "status coalesced");
            entry.status = status;
            return true;
        }

        match self.tx.try_send(update) {
            Ok(()) => true,
            Err(TrySendError::Full(update)) => {
                warn!(
                    sensor = %update.sensor,
                    status = %update.status,
                    "status queue full, keeping latest status per sensor"
                );
                backlog.push(update);
                true
            }
            Err(TrySendError::Closed(update)) => {
                IngestMetrics::incr(&self.metrics.status_drops);
                warn!(
                    sensor = %update.sensor,
                    status = %update.status,
                    "status propagator stopped, dropping status update"
                );
                false
            }
        }
    }
}

/// Delivery totals reported when the propagator exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagatorSummary {
    pub delivered: u64,
    pub failed: u64,
}

/// Consumer side, run as its own task
pub struct StatusPropagator {
    rx: mpsc::Receiver<StatusUpdate>,
    backlog: Backlog,
    reporter: Arc<dyn StatusReporter>,
    metrics: Arc<IngestMetrics>,
}

/// Create a propagator and the handle that feeds it
pub fn status_channel(
    capacity: usize,
    reporter: Arc<dyn StatusReporter>,
    metrics: Arc<IngestMetrics>,
) -> (StatusHandle, StatusPropagator) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let backlog = Backlog::default();
    (
        StatusHandle {
            tx,
            backlog: Arc::clone(&backlog),
            metrics: Arc::clone(&metrics),
        },
        StatusPropagator {
            rx,
            backlog,
            reporter,
            metrics,
        },
    )
}

impl StatusPropagator {
    pub fn spawn(self) -> JoinHandle<PropagatorSummary> {
        tokio::spawn(self.run())
    }

    /// Deliver updates one at a time until every handle is dropped
    pub async fn run(mut self) -> PropagatorSummary {
        let mut summary = PropagatorSummary::default();

        loop {
            let update = match self.rx.try_recv() {
                Ok(update) => update,
                Err(TryRecvError::Empty) => {
                    // Older queued transitions are all delivered; the backlog is next
                    let overflow = mem::take(&mut *self.backlog.lock());
                    if !overflow.is_empty() {
                        for update in overflow {
                            deliver(&*self.reporter, &self.metrics, update, &mut summary).await;
                        }
                        continue;
                    }
                    match self.rx.recv().await {
                        Some(update) => update,
                        None => break,
                    }
                }
                Err(TryRecvError::Disconnected) => break,
            };
            deliver(&*self.reporter, &self.metrics, update, &mut summary).await;
        }

        let overflow = mem::take(&mut *self.backlog.lock());
        for update in overflow {
            deliver(&*self.reporter, &self.metrics, update, &mut summary).await;
        }

        debug!(
            delivered = summary.delivered,
            failed = summary.failed,
            "status propagator stopped"
        );
        summary
    }
}

async fn deliver(
    reporter: &dyn StatusReporter,
    metrics: &IngestMetrics,
    update: StatusUpdate,
    summary: &mut PropagatorSummary,
) {
    match reporter.update_status(update.sensor, update.status).await {
        Ok(()) => {
            summary.delivered += 1;
            debug!(sensor = %update.sensor, status = %update.status, "status propagated");
        }
        Err(e) => {
            summary.failed += 1;
            IngestMetrics::incr(&metrics.status_failures);
            warn!(sensor = %update.sensor, "status propagation failed: {}", e);
        }
    }
}
