//! Error types for the ingest service

use thiserror::Error;
use types::{PresenceStatus, SensorId};

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Main error type for ingest operations
#[derive(Debug, Error)]
pub enum IngestError {
    /// MQTT broker refused or dropped the initial connection
    #[error("Broker connection to {host}:{port} failed: {reason}")]
    BrokerConnect {
        host: String,
        port: u16,
        reason: String,
    },

    /// Startup step did not finish in time
    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: &'static str, timeout_ms: u64 },

    /// Endpoint URL could not be parsed
    #[error("Invalid {service} endpoint '{url}': {reason}")]
    InvalidEndpoint {
        service: &'static str,
        url: String,
        reason: String,
    },

    /// gRPC channel could not be established
    #[error("Failed to connect to {service} at {url}: {source}")]
    ServiceConnect {
        service: &'static str,
        url: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// Analyzer did not answer the liveness call
    #[error("Analyzer liveness check failed: {0}")]
    Liveness(String),

    /// Opening or writing the per-sensor analysis stream failed
    #[error("Analysis stream for {sensor} failed: {reason}")]
    StreamFailed { sensor: SensorId, reason: String },

    /// The call behind the analysis stream has ended
    #[error("Analysis stream for {sensor} is closed")]
    StreamClosed { sensor: SensorId },

    /// Gateway RPC failed
    #[error("Status update '{status}' for {sensor} failed: {reason}")]
    StatusUpdateFailed {
        sensor: SensorId,
        status: PresenceStatus,
        reason: String,
    },

    /// Gateway answered with `success = false`
    #[error("Gateway rejected status '{status}' for {sensor}")]
    StatusRejected {
        sensor: SensorId,
        status: PresenceStatus,
    },

    /// Subscribe or unsubscribe request could not be queued
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Configuration error in service settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Steady-state failures that are logged and survived
    ///
    /// Everything else only happens while wiring the service up and ends the process.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IngestError::StreamFailed { .. }
                | IngestError::StreamClosed { .. }
                | IngestError::StatusUpdateFailed { .. }
                | IngestError::StatusRejected { .. }
                | IngestError::Mqtt(_)
        )
    }

    pub fn stream_failed(sensor: SensorId, reason: impl ToString) -> Self {
        IngestError::StreamFailed {
            sensor,
            reason: reason.to_string(),
        }
    }
}
