//! In-process fakes for the pipeline seams

#![allow(dead_code)]

use async_trait::async_trait;
use audio_ingest::{
    status_channel, AnalysisClient, BatchSink, IngestError, IngestMetrics, PipelineOptions,
    Result, SensorRegistry, StatusPropagator, StatusReporter, SubscriptionManager,
    TopicSubscriber,
};
use codec::TopicLayout;
use ingest_config::WorkerRetention;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use types::{Batch, PresenceStatus, SensorId};

/// Analyzer that records every batch and can be told to fail
#[derive(Default)]
pub struct MockAnalyzer {
    pub batches: Arc<Mutex<Vec<Batch>>>,
    pub opens: AtomicUsize,
    /// Opens to reject before accepting
    pub failing_opens: AtomicUsize,
    /// Sends to reject before accepting, shared by every sink
    pub failing_sends: Arc<AtomicUsize>,
}

impl MockAnalyzer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_opens(&self, count: usize) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<Batch> {
        self.batches.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

fn take_failure(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

pub struct MockSink {
    sensor: SensorId,
    batches: Arc<Mutex<Vec<Batch>>>,
    failing_sends: Arc<AtomicUsize>,
}

#[async_trait]
impl BatchSink for MockSink {
    async fn send(&mut self, batch: Batch) -> Result<()> {
        if take_failure(&self.failing_sends) {
            return Err(IngestError::stream_failed(self.sensor, "injected send failure"));
        }
        self.batches.lock().push(batch);
        Ok(())
    }
}

#[async_trait]
impl AnalysisClient for MockAnalyzer {
    async fn open_stream(&self, sensor: SensorId) -> Result<Box<dyn BatchSink>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_opens) {
            return Err(IngestError::stream_failed(sensor, "injected open failure"));
        }
        Ok(Box::new(MockSink {
            sensor,
            batches: Arc::clone(&self.batches),
            failing_sends: Arc::clone(&self.failing_sends),
        }))
    }

    async fn check_liveness(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// Gateway fake recording every update in arrival order
#[derive(Default)]
pub struct MockReporter {
    pub updates: Mutex<Vec<(SensorId, PresenceStatus)>>,
}

#[async_trait]
impl StatusReporter for MockReporter {
    async fn update_status(&self, sensor: SensorId, status: PresenceStatus) -> Result<()> {
        self.updates.lock().push((sensor, status));
        Ok(())
    }
}

/// Broker fake recording subscribe and unsubscribe requests
#[derive(Default)]
pub struct MockSubscriber {
    pub requests: Mutex<Vec<String>>,
}

impl TopicSubscriber for MockSubscriber {
    fn subscribe(&self, topic: &str) -> Result<()> {
        self.requests.lock().push(format!("sub {}", topic));
        Ok(())
    }

    fn unsubscribe(&self, topic: &str) -> Result<()> {
        self.requests.lock().push(format!("unsub {}", topic));
        Ok(())
    }
}

/// A manager wired to fakes, plus handles to inspect them
pub struct Harness {
    pub manager: SubscriptionManager<MockSubscriber>,
    pub registry: Arc<SensorRegistry>,
    pub analyzer: Arc<MockAnalyzer>,
    pub reporter: Arc<MockReporter>,
    pub metrics: Arc<IngestMetrics>,
    pub propagator: Option<StatusPropagator>,
}

impl Harness {
    pub fn new(queue_capacity: usize, threshold: usize, retention: WorkerRetention) -> Self {
        let registry = Arc::new(SensorRegistry::new(queue_capacity));
        let analyzer = MockAnalyzer::new();
        let reporter = Arc::new(MockReporter::default());
        let metrics = IngestMetrics::new();
        let (status, propagator) = status_channel(
            64,
            Arc::clone(&reporter) as Arc<dyn StatusReporter>,
            Arc::clone(&metrics),
        );

        let manager = SubscriptionManager::new(
            TopicLayout::default(),
            Arc::clone(&registry),
            Arc::clone(&analyzer) as Arc<dyn AnalysisClient>,
            MockSubscriber::default(),
            status,
            Arc::clone(&metrics),
            PipelineOptions {
                batch_threshold_bytes: threshold,
                worker_retention: retention,
            },
        );

        Self {
            manager,
            registry,
            analyzer,
            reporter,
            metrics,
            propagator: Some(propagator),
        }
    }
}
