//! Service wiring
//!
//! Startup order matters: the downstream services are connected (and the analyzer
//! probed) before the broker session exists, so no worker is ever started against a
//! missing analyzer. Any failure before [`IngestService::run_until`] is fatal.

use crate::error::{IngestError, Result};
use crate::forwarder::{AnalysisClient, StatusReporter};
use crate::grpc::{GrpcAnalysisClient, GrpcStatusReporter};
use crate::health::IngestHealthProbe;
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::registry::SensorRegistry;
use crate::status::{status_channel, PropagatorSummary, StatusPropagator};
use crate::subscription::{PipelineOptions, SubscriptionManager, WorkerHandle};
use crate::transport::{MqttSubscriber, MqttTransport};
use earshot_health_check::HealthCheckServer;
use ingest_config::IngestConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long shutdown waits for all workers together, and then for the status propagator
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Name reported by the health endpoint
pub const SERVICE_NAME: &str = "audio_ingest";

/// Fully wired ingest service, connected to every collaborator
pub struct IngestService {
    config: IngestConfig,
    metrics: Arc<IngestMetrics>,
    registry: Arc<SensorRegistry>,
    transport: MqttTransport,
    manager: SubscriptionManager<MqttSubscriber>,
    propagator: StatusPropagator,
}

impl IngestService {
    /// Connect downstream services and the broker
    pub async fn connect(config: IngestConfig) -> Result<Self> {
        let analyzer = GrpcAnalysisClient::connect(&config.analyzer).await?;
        if config.analyzer.verify_on_startup {
            analyzer
                .check_liveness(config.analyzer.liveness_timeout())
                .await?;
        }
        let gateway = GrpcStatusReporter::connect(&config.gateway).await?;

        let metrics = IngestMetrics::new();
        let mut transport = MqttTransport::new(&config.broker, Arc::clone(&metrics));
        transport
            .wait_connected(config.broker.connect_timeout())
            .await?;

        Ok(Self::assemble(
            config,
            metrics,
            transport,
            Arc::new(analyzer),
            Arc::new(gateway),
        ))
    }

    /// Wire the pipeline around an already connected transport
    pub fn assemble(
        config: IngestConfig,
        metrics: Arc<IngestMetrics>,
        transport: MqttTransport,
        analyzer: Arc<dyn AnalysisClient>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        let registry = Arc::new(SensorRegistry::new(config.pipeline.queue_capacity));
        let (status, propagator) = status_channel(
            config.pipeline.status_queue_capacity,
            reporter,
            Arc::clone(&metrics),
        );

        let manager = SubscriptionManager::new(
            config.broker.topic_layout(),
            Arc::clone(&registry),
            analyzer,
            transport.subscriber(),
            status,
            Arc::clone(&metrics),
            PipelineOptions::from(&config.pipeline),
        );

        Self {
            config,
            metrics,
            registry,
            transport,
            manager,
            propagator,
        }
    }

    pub fn metrics(&self) -> Arc<IngestMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn registry(&self) -> Arc<SensorRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run until `shutdown` resolves, then drain workers and the propagator
    pub async fn run_until<F>(self, shutdown: F) -> Result<MetricsSnapshot>
    where
        F: Future<Output = ()>,
    {
        let IngestService {
            config,
            metrics,
            registry,
            transport,
            manager,
            propagator,
        } = self;

        let health_task = if config.health.enabled {
            let probe = Arc::new(IngestHealthProbe::new(
                Arc::clone(&registry),
                Arc::clone(&metrics),
            ));
            let server = HealthCheckServer::new(SERVICE_NAME, probe, config.health.port);
            let (_, handle) = server
                .spawn()
                .map_err(|e| IngestError::Configuration(e.to_string()))?;
            Some(handle)
        } else {
            None
        };

        let propagator_task = propagator.spawn();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let transport_task = tokio::spawn(transport.run(manager, shutdown_rx));

        info!(
            sample_rate = config.pipeline.sample_rate,
            window_secs = config.pipeline.batch_window_secs,
            queue_capacity = config.pipeline.queue_capacity,
            retention = ?config.pipeline.worker_retention,
            "audio ingest running"
        );

        shutdown.await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);

        match transport_task.await {
            Ok(mut manager) => {
                let workers = manager.drain();
                drop(manager);
                let total = workers.len();
                info!(workers = total, "waiting for stream handlers");
                let joined = join_workers(workers, DRAIN_TIMEOUT).await;
                info!(joined, total, "stream handlers stopped");
            }
            Err(e) => warn!("Transport task ended abnormally: {}", e),
        }

        if let Some(summary) = await_with_deadline(propagator_task, "status propagator").await {
            let PropagatorSummary { delivered, failed } = summary;
            info!(delivered, failed, "status propagator drained");
        }

        if let Some(handle) = health_task {
            handle.abort();
        }

        let snapshot = metrics.snapshot();
        info!(
            packets = snapshot.packets_received,
            batches = snapshot.batches_forwarded,
            dropped = snapshot.dropped_packets(),
            "audio ingest stopped"
        );
        Ok(snapshot)
    }
}

/// Await every worker under one shared deadline; returns how many finished cleanly
pub(crate) async fn join_workers(workers: Vec<WorkerHandle>, deadline: Duration) -> usize {
    let total = workers.len();
    let mut joined = 0;

    let all = async {
        for worker in workers {
            match worker.handle.await {
                Ok(_) => joined += 1,
                Err(e) => warn!(sensor = %worker.sensor, "stream handler failed: {}", e),
            }
        }
    };

    if tokio::time::timeout(deadline, all).await.is_err() {
        warn!(
            stalled = total - joined,
            "stream handlers did not stop within {:?}", deadline
        );
    }
    joined
}

async fn await_with_deadline<T>(handle: JoinHandle<T>, what: &str) -> Option<T> {
    match tokio::time::timeout(DRAIN_TIMEOUT, handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("{} task failed: {}", what, e);
            None
        }
        Err(_) => {
            warn!("{} did not stop within {:?}", what, DRAIN_TIMEOUT);
            None
        }
    }
}
