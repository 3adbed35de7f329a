//! Codec-level errors for sensor frame processing
//!
//! Each variant carries enough context to explain a dropped message in a single log
//! line, since malformed input is logged and discarded rather than propagated.

use thiserror::Error;
use types::ValidationError;

/// Frame and topic decoding errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Message buffer is too small to contain the sequence header
    #[error("Message too small: need {need} bytes, got {got} (context: {context})")]
    MessageTooSmall {
        need: usize,
        got: usize,
        context: String,
    },

    /// Topic does not belong to the expected hierarchy
    #[error("Unexpected topic '{topic}': expected prefix '{expected_prefix}'")]
    UnexpectedTopic {
        topic: String,
        expected_prefix: String,
    },

    /// Sensor id or presence value failed validation
    #[error("Invalid value on topic '{topic}': {source}")]
    InvalidValue {
        topic: String,
        #[source]
        source: ValidationError,
    },

    /// Presence payload is not valid UTF-8
    #[error("Presence payload on '{topic}' is not valid UTF-8 ({len} bytes)")]
    NonUtf8Presence { topic: String, len: usize },
}

impl CodecError {
    /// Create MessageTooSmall error with diagnostic context
    pub fn message_too_small(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::MessageTooSmall {
            need,
            got,
            context: context.into(),
        }
    }

    pub fn invalid_value(topic: impl Into<String>, source: ValidationError) -> Self {
        Self::InvalidValue {
            topic: topic.into(),
            source,
        }
    }
}

/// Result type for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;
