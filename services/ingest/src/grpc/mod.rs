//! gRPC implementations of the downstream contracts
//!
//! - [`GrpcAnalysisClient`]: `api.AnalyzerService/Analyze` streams and the
//!   `api.HealthService/Healthcheck` liveness call
//! - [`GrpcStatusReporter`]: `api.GatewayService/UpdateStatus`

pub mod analyzer;
pub mod gateway;
pub mod proto;

pub use analyzer::{GrpcAnalysisClient, GrpcBatchSink};
pub use gateway::GrpcStatusReporter;

use crate::error::{IngestError, Result};
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tracing::info;

/// Establish a channel, failing if it is not up within `timeout`
pub async fn connect_channel(
    service: &'static str,
    url: &str,
    timeout: Duration,
) -> Result<Channel> {
    let endpoint = Endpoint::from_shared(url.to_string())
        .map_err(|e| IngestError::InvalidEndpoint {
            service,
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .connect_timeout(timeout);

    info!("🔌 Connecting to {} at {}", service, url);

    let channel = tokio::time::timeout(timeout, endpoint.connect())
        .await
        .map_err(|_| IngestError::Timeout {
            what: service,
            timeout_ms: timeout.as_millis() as u64,
        })?
        .map_err(|source| IngestError::ServiceConnect {
            service,
            url: url.to_string(),
            source,
        })?;

    info!("✅ Connected to {}", service);
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_connecting() {
        let err = connect_channel("analyzer", "not a url", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidEndpoint { .. }));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_fatal() {
        // Port 9 (discard) on loopback is closed in test environments
        let err = connect_channel("gateway", "http://127.0.0.1:9", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::ServiceConnect { .. } | IngestError::Timeout { .. }
        ));
    }
}
