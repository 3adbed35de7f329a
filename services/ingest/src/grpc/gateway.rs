//! Gateway status reporter

use super::connect_channel;
use super::proto::gateway_service_client::GatewayServiceClient;
use super::proto::StatusRequest;
use crate::error::{IngestError, Result};
use crate::forwarder::StatusReporter;
use async_trait::async_trait;
use ingest_config::GatewayConfig;
use std::time::Duration;
use types::{PresenceStatus, SensorId};

/// Deadline for one UpdateStatus call
const STATUS_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Connected gateway service
#[derive(Debug, Clone)]
pub struct GrpcStatusReporter {
    client: GatewayServiceClient,
}

impl GrpcStatusReporter {
    pub async fn connect(config: &GatewayConfig) -> Result<Self> {
        let channel = connect_channel("gateway", &config.url, config.connect_timeout()).await?;
        Ok(Self {
            client: GatewayServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl StatusReporter for GrpcStatusReporter {
    async fn update_status(&self, sensor: SensorId, status: PresenceStatus) -> Result<()> {
        let mut client = self.client.clone();
        let mut request = tonic::Request::new(StatusRequest {
            sensor_id: sensor.inner(),
            status: status.as_str().to_string(),
        });
        request.set_timeout(STATUS_RPC_TIMEOUT);

        let response = client
            .update_status(request)
            .await
            .map_err(|e| IngestError::StatusUpdateFailed {
                sensor,
                status,
                reason: e.to_string(),
            })?;

        if response.into_inner().success {
            Ok(())
        } else {
            Err(IngestError::StatusRejected { sensor, status })
        }
    }
}
