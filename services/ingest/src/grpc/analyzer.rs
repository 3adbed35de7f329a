//! Analyzer client
//!
//! Each worker gets its own client-streaming `Analyze` call. The call runs in a
//! spawned task that drains an mpsc channel; the worker's [`GrpcBatchSink`] holds the
//! sending half. When the call ends for any reason the channel closes, the next send
//! fails with [`IngestError::StreamClosed`], and the worker opens a fresh stream.

use super::connect_channel;
use super::proto::analyzer_service_client::AnalyzerServiceClient;
use super::proto::health_service_client::HealthServiceClient;
use super::proto::{AudioBuf, Payload};
use crate::error::{IngestError, Result};
use crate::forwarder::{AnalysisClient, BatchSink};
use async_trait::async_trait;
use ingest_config::AnalyzerConfig;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use types::{Batch, SensorId};

/// Batches buffered between a worker and its call
const STREAM_BUFFER: usize = 4;

/// Sensor id sent with the startup liveness call
const LIVENESS_SENSOR_ID: &str = "sensor-1";

/// Connected analyzer service
#[derive(Debug, Clone)]
pub struct GrpcAnalysisClient {
    analyzer: AnalyzerServiceClient,
    health: HealthServiceClient,
}

impl GrpcAnalysisClient {
    pub async fn connect(config: &AnalyzerConfig) -> Result<Self> {
        let channel = connect_channel("analyzer", &config.url, config.connect_timeout()).await?;
        Ok(Self {
            analyzer: AnalyzerServiceClient::new(channel.clone()),
            health: HealthServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl AnalysisClient for GrpcAnalysisClient {
    async fn open_stream(&self, sensor: SensorId) -> Result<Box<dyn BatchSink>> {
        let (tx, rx) = mpsc::channel::<AudioBuf>(STREAM_BUFFER);
        let mut analyzer = self.analyzer.clone();

        tokio::spawn(async move {
            match analyzer.analyze(ReceiverStream::new(rx)).await {
                Ok(_) => debug!(%sensor, "analysis stream completed"),
                Err(status) => warn!(%sensor, "analysis stream ended: {}", status),
            }
        });

        Ok(Box::new(GrpcBatchSink { sensor, tx }))
    }

    async fn check_liveness(&self, timeout: Duration) -> Result<()> {
        let mut health = self.health.clone();
        let mut request = tonic::Request::new(Payload {
            sensor_id: LIVENESS_SENSOR_ID.to_string(),
        });
        request.set_timeout(timeout);

        match tokio::time::timeout(timeout, health.healthcheck(request)).await {
            Ok(Ok(_)) => {
                info!("Analyzer liveness check passed");
                Ok(())
            }
            Ok(Err(status)) => Err(IngestError::Liveness(status.to_string())),
            Err(_) => Err(IngestError::Timeout {
                what: "analyzer liveness check",
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Sending half of one `Analyze` call
#[derive(Debug)]
pub struct GrpcBatchSink {
    sensor: SensorId,
    tx: mpsc::Sender<AudioBuf>,
}

#[async_trait]
impl BatchSink for GrpcBatchSink {
    async fn send(&mut self, batch: Batch) -> Result<()> {
        let message = AudioBuf {
            sensor_id: batch.sensor_id.inner(),
            seq_offset: batch.sequence_offset,
            pcm: batch.pcm,
        };
        self.tx
            .send(message)
            .await
            .map_err(|_| IngestError::StreamClosed {
                sensor: self.sensor,
            })
    }
}
