//! Validation errors for identifiers and presence values

use thiserror::Error;

/// Errors raised while validating values read off the transport
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Topic segment that should hold the sensor id was empty
    #[error("Sensor id is empty")]
    EmptySensorId,

    /// Topic segment is not a decimal i32
    #[error("Invalid sensor id '{input}': expected a decimal integer")]
    InvalidSensorId { input: String },

    /// Presence payload other than `online` / `offline`
    #[error("Invalid presence status '{input}': expected 'online' or 'offline'")]
    InvalidPresence { input: String },
}
