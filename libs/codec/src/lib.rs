//! # Earshot Sensor Codec
//!
//! ## Purpose
//!
//! The "rules" layer between the MQTT transport and the ingest pipeline:
//! - Audio frame decoding into [`Packet`](types::Packet) (and the inverse framing)
//! - Presence payload decoding into [`PresenceEvent`](types::PresenceEvent)
//! - Topic layout: which topic carries which sensor's audio or presence
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → services/ingest
//!     ↑           ↓              ↓
//! Pure Data   Framing Rules   Transport + Workers
//! Packet      decode_packet   MQTT event loop
//! Batch       TopicLayout     registry / workers
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Transport connections or subscriptions (belongs in services/ingest)
//! - Per-sensor state: decoding is pure and stateless
//!
//! ## Wire Format
//!
//! ```text
//! audio frame:   [ seq: u32 big-endian ][ PCM s16le mono ... ]
//! presence:      "online" | "offline"   on  <presence_prefix>/<sensor_id>
//! ```

pub mod error;
pub mod parser;
pub mod topics;

pub use error::{CodecError, CodecResult};
pub use parser::{decode_packet, decode_presence, encode_packet};
pub use topics::{TopicKind, TopicLayout, DEFAULT_AUDIO_PREFIX, DEFAULT_PRESENCE_PREFIX};
