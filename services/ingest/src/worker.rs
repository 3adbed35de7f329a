//! # Sensor Stream Worker
//!
//! One task per online sensor. The worker is the only reader of its queue and the only
//! writer of its stream state, so none of that state needs a lock.
//!
//! ```text
//! inbox (bounded FIFO) ──▶ StreamAccumulator ──batch──▶ BatchSink (analysis stream)
//!                            │ gap detection
//!                            │ append + wrapping increment
//!                            └ flush at threshold
//! ```
//!
//! The folding logic lives in [`StreamAccumulator`], which is plain synchronous state
//! and is tested without a runtime. [`StreamWorker`] adds the queue, the downstream
//! stream and the logging.
//!
//! ## Lifecycle
//!
//! The loop ends when every sender for the queue is gone and the queue is drained.
//! Buffered bytes below the threshold are discarded at that point; there is no partial
//! flush.
//!
//! ## Downstream failures
//!
//! The stream is opened once at start and reused for every batch. A failed open or a
//! failed send is logged and counted, the stream is dropped, and a fresh one is opened
//! at the next flush. The batch that failed is not retried.

use crate::forwarder::{AnalysisClient, BatchSink};
use crate::metrics::IngestMetrics;
use crate::registry::PacketReceiver;
use std::future::Future;
use std::mem;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::{Batch, Packet, SensorId};

/// A sequence discontinuity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub expected: u32,
    pub received: u32,
}

/// What folding one packet produced
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Ingested {
    /// Set when the packet did not carry the expected sequence number
    pub gap: Option<Gap>,
    /// Set when the append crossed the batch threshold
    pub batch: Option<Batch>,
}

/// Sequence tracking and windowed batching for one sensor
#[derive(Debug)]
pub struct StreamAccumulator {
    sensor: SensorId,
    expected_sequence: u32,
    buffer: Vec<u8>,
    threshold: usize,
}

impl StreamAccumulator {
    pub fn new(sensor: SensorId, threshold: usize) -> Self {
        Self {
            sensor,
            expected_sequence: 0,
            buffer: Vec::new(),
            threshold,
        }
    }

    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    pub fn expected_sequence(&self) -> u32 {
        self.expected_sequence
    }

    /// Bytes buffered since the last flush
    pub fn accumulated_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Fold one packet into the stream
    pub fn ingest(&mut self, packet: Packet) -> Ingested {
        let mut result = Ingested::default();

        if packet.sequence != self.expected_sequence {
            result.gap = Some(Gap {
                expected: self.expected_sequence,
                received: packet.sequence,
            });
            self.expected_sequence = packet.sequence;
        }

        self.buffer.extend_from_slice(&packet.payload);
        self.expected_sequence = self.expected_sequence.wrapping_add(1);

        if self.buffer.len() >= self.threshold {
            result.batch = Some(Batch {
                sensor_id: self.sensor,
                sequence_offset: self.expected_sequence,
                pcm: mem::take(&mut self.buffer),
            });
        }

        result
    }

    /// Drop whatever is buffered, returning the byte count
    pub fn discard(&mut self) -> usize {
        let discarded = self.buffer.len();
        self.buffer.clear();
        discarded
    }
}

/// Totals reported when a worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub packets: u64,
    pub batches_sent: u64,
    pub gaps: u64,
    pub discarded_bytes: usize,
}

/// Per-sensor worker task
pub struct StreamWorker {
    accumulator: StreamAccumulator,
    inbox: PacketReceiver,
    client: Arc<dyn AnalysisClient>,
    sink: Option<Box<dyn BatchSink>>,
    metrics: Arc<IngestMetrics>,
    summary: WorkerSummary,
}

impl StreamWorker {
    pub fn new(
        sensor: SensorId,
        inbox: PacketReceiver,
        threshold: usize,
        client: Arc<dyn AnalysisClient>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            accumulator: StreamAccumulator::new(sensor, threshold),
            inbox,
            client,
            sink: None,
            metrics,
            summary: WorkerSummary::default(),
        }
    }

    pub fn spawn(self) -> JoinHandle<WorkerSummary> {
        tokio::spawn(self.run())
    }

    /// Consume the queue until it is closed and drained
    pub async fn run(mut self) -> WorkerSummary {
        let sensor = self.accumulator.sensor();
        IngestMetrics::incr(&self.metrics.workers_started);
        info!(%sensor, threshold = self.accumulator.threshold(), "stream handler started");

        self.sink = self.open_sink().await;

        while let Some(packet) = self.inbox.recv().await {
            self.summary.packets += 1;
            let Ingested { gap, batch } = self.accumulator.ingest(packet);

            if let Some(gap) = gap {
                self.summary.gaps += 1;
                IngestMetrics::incr(&self.metrics.sequence_gaps);
                info!(
                    %sensor,
                    received = gap.received,
                    expected = gap.expected,
                    "sequence mismatch, resyncing"
                );
            }

            if let Some(batch) = batch {
                self.forward(batch).await;
            }
        }

        self.summary.discarded_bytes = self.accumulator.discard();
        debug!(
            %sensor,
            discarded_bytes = self.summary.discarded_bytes,
            "discarding partial batch"
        );
        info!(%sensor, packets = self.summary.packets, "stream handler shutting down");
        IngestMetrics::incr(&self.metrics.workers_stopped);

        self.summary
    }

    async fn forward(&mut self, batch: Batch) {
        let sensor = batch.sensor_id;

        if self.sink.is_none() {
            self.sink = self.open_sink().await;
        }
        let Some(sink) = self.sink.as_mut() else {
            warn!(%sensor, bytes = batch.pcm.len(), "no analysis stream, batch dropped");
            return;
        };

        let bytes = batch.pcm.len();
        let seq_offset = batch.sequence_offset;
        info!(%sensor, bytes, seq_offset, "forwarding batch");

        match sink.send(batch).await {
            Ok(()) => {
                self.summary.batches_sent += 1;
                self.metrics.record_batch(bytes);
            }
            Err(e) => {
                error!(%sensor, seq_offset, "batch send failed, reopening stream at next flush: {}", e);
                IngestMetrics::incr(&self.metrics.forward_failures);
                self.sink = None;
            }
        }
    }

    /// Open a stream without borrowing the worker across the call
    fn open_sink(&self) -> impl Future<Output = Option<Box<dyn BatchSink>>> + Send + 'static {
        let sensor = self.accumulator.sensor();
        let client = Arc::clone(&self.client);
        let metrics = Arc::clone(&self.metrics);

        async move {
            match client.open_stream(sensor).await {
                Ok(sink) => {
                    debug!(%sensor, "analysis stream open");
                    Some(sink)
                }
                Err(e) => {
                    error!(%sensor, "failed to open analysis stream: {}", e);
                    IngestMetrics::incr(&metrics.forward_failures);
                    None
                }
            }
        }
    }
}
