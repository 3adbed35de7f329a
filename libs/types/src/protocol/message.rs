//! Messages flowing through the ingest pipeline
//!
//! ```text
//! transport frame ──decode──▶ Packet ──worker──▶ Batch ──▶ analyzer stream
//! presence frame  ──decode──▶ PresenceEvent ──▶ registry + gateway
//! ```

use crate::common::errors::ValidationError;
use crate::common::identifiers::SensorId;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// One sequenced audio frame from a sensor
///
/// The payload is owned; decoding copies it out of the transport buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub sequence: u32,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(sequence: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A window of reassembled PCM handed to the analyzer
///
/// `sequence_offset` is the next sequence number the worker expected when the batch was
/// cut, so the analyzer can tell where the following batch starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub sensor_id: SensorId,
    pub sequence_offset: u32,
    pub pcm: Vec<u8>,
}

impl Batch {
    /// Duration covered by this batch at the given byte rate
    pub fn duration_secs(&self, bytes_per_second: usize) -> f64 {
        if bytes_per_second == 0 {
            return 0.0;
        }
        self.pcm.len() as f64 / bytes_per_second as f64
    }
}

/// Sensor lifecycle state published on the presence topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    /// Wire text, also the `status` field sent to the gateway
    pub const fn as_str(self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Offline => "offline",
        }
    }

    pub const fn is_online(self) -> bool {
        matches!(self, PresenceStatus::Online)
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(PresenceStatus::Online),
            "offline" => Ok(PresenceStatus::Offline),
            other => Err(ValidationError::InvalidPresence {
                input: other.to_string(),
            }),
        }
    }
}

/// A decoded presence transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEvent {
    pub sensor: SensorId,
    pub status: PresenceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_round_trip_text() {
        for status in [PresenceStatus::Online, PresenceStatus::Offline] {
            assert_eq!(status.as_str().parse::<PresenceStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_presence_is_case_sensitive() {
        assert!(matches!(
            "ONLINE".parse::<PresenceStatus>(),
            Err(ValidationError::InvalidPresence { .. })
        ));
        assert!("".parse::<PresenceStatus>().is_err());
    }

    #[test]
    fn test_batch_duration() {
        let batch = Batch {
            sensor_id: SensorId::new(1),
            sequence_offset: 0,
            pcm: vec![0; 64_000],
        };
        assert_eq!(batch.duration_secs(32_000), 2.0);
        assert_eq!(batch.duration_secs(0), 0.0);
    }
}
