//! # Earshot Types Library
//!
//! Shared type system for the sensor audio ingest pipeline.
//!
//! ## Design Philosophy
//!
//! - **Typed identifiers**: `SensorId` wraps the wire `i32` so a sensor id can't be
//!   confused with a sequence number or a byte count
//! - **Owned payloads**: `Packet` carries a copied `Bytes` payload, never a view into a
//!   transport buffer
//! - **Single audio format**: mono 16-bit little-endian PCM at a configured sample rate;
//!   `AudioFormat` derives the batch threshold from it
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{AudioFormat, PresenceStatus, SensorId};
//!
//! let sensor = SensorId::new(7);
//! assert_eq!(sensor.to_string(), "sensor-7");
//!
//! let format = AudioFormat::mono_pcm16(16_000);
//! assert_eq!(format.batch_threshold_bytes(10), 320_000);
//!
//! let status: PresenceStatus = "online".parse().unwrap();
//! assert!(status.is_online());
//! ```
//!
//! ## Integration Points
//!
//! - **codec**: decodes transport frames into [`Packet`] and presence payloads into
//!   [`PresenceEvent`]
//! - **audio-ingest**: workers fold packets into [`Batch`]es and forward them downstream

pub mod common;
pub mod protocol;

pub use common::errors::ValidationError;
pub use common::identifiers::SensorId;
pub use protocol::constants::{
    AudioFormat, BYTES_PER_SAMPLE, DEFAULT_BATCH_WINDOW_SECS, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SAMPLE_RATE, MONO_CHANNELS, SEQUENCE_HEADER_LEN,
};
pub use protocol::message::{Batch, Packet, PresenceEvent, PresenceStatus};
