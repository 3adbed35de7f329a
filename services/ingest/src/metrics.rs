//! Ingest counters
//!
//! Relaxed atomics shared by the transport task, the workers and the status
//! propagator. They are for observation only and never order anything.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Pipeline counters
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Audio frames received from the broker
    pub packets_received: AtomicU64,
    /// Audio or presence frames that failed to decode
    pub decode_failures: AtomicU64,
    /// Packets for sensors with no registry entry
    pub unknown_sensor_drops: AtomicU64,
    /// Packets dropped because the sensor queue was full
    pub overload_drops: AtomicU64,
    /// Packets dropped because the worker had already exited
    pub closed_queue_drops: AtomicU64,
    /// Sequence discontinuities seen by workers
    pub sequence_gaps: AtomicU64,
    pub batches_forwarded: AtomicU64,
    pub bytes_forwarded: AtomicU64,
    /// Stream opens or batch sends that failed
    pub forward_failures: AtomicU64,
    /// Status updates that failed or were rejected
    pub status_failures: AtomicU64,
    /// Status updates superseded in the overflow backlog or reported after shutdown
    pub status_drops: AtomicU64,
    pub workers_started: AtomicU64,
    pub workers_stopped: AtomicU64,
    /// Broker (re)connections acknowledged
    pub broker_connects: AtomicU64,
    /// Whether the broker session is currently up
    pub broker_connected: AtomicBool,
}

/// Point-in-time copy of [`IngestMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub decode_failures: u64,
    pub unknown_sensor_drops: u64,
    pub overload_drops: u64,
    pub closed_queue_drops: u64,
    pub sequence_gaps: u64,
    pub batches_forwarded: u64,
    pub bytes_forwarded: u64,
    pub forward_failures: u64,
    pub status_failures: u64,
    pub status_drops: u64,
    pub workers_started: u64,
    pub workers_stopped: u64,
    pub broker_connects: u64,
    pub broker_connected: bool,
}

impl MetricsSnapshot {
    /// Every packet dropped on the enqueue path
    pub fn dropped_packets(&self) -> u64 {
        self.decode_failures
            + self.unknown_sensor_drops
            + self.overload_drops
            + self.closed_queue_drops
    }
}

impl IngestMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, bytes: usize) {
        self.batches_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn set_broker_connected(&self, connected: bool) {
        self.broker_connected.store(connected, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            packets_received: load(&self.packets_received),
            decode_failures: load(&self.decode_failures),
            unknown_sensor_drops: load(&self.unknown_sensor_drops),
            overload_drops: load(&self.overload_drops),
            closed_queue_drops: load(&self.closed_queue_drops),
            sequence_gaps: load(&self.sequence_gaps),
            batches_forwarded: load(&self.batches_forwarded),
            bytes_forwarded: load(&self.bytes_forwarded),
            forward_failures: load(&self.forward_failures),
            status_failures: load(&self.status_failures),
            status_drops: load(&self.status_drops),
            workers_started: load(&self.workers_started),
            workers_stopped: load(&self.workers_stopped),
            broker_connects: load(&self.broker_connects),
            broker_connected: self.broker_connected.load(Ordering::Relaxed),
        }
    }
}
