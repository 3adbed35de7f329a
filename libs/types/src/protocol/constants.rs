//! Protocol constants and the audio format
//!
//! These are fundamental values shared by the codec and the ingest service.
//! Framing logic itself lives in the codec crate.

/// Length of the big-endian sequence number that prefixes every audio frame
pub const SEQUENCE_HEADER_LEN: usize = 4;

/// Sample rate sensors capture at unless configured otherwise (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Seconds of audio accumulated per batch
pub const DEFAULT_BATCH_WINDOW_SECS: u32 = 10;

/// Capacity of each sensor's inbound packet queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Sensors publish one channel
pub const MONO_CHANNELS: u16 = 1;

/// 16-bit PCM
pub const BYTES_PER_SAMPLE: u16 = 2;

/// PCM layout of the sensor streams
///
/// The batch threshold is derived from this rather than configured in bytes so that
/// changing the sample rate keeps each batch at the same duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
}

impl AudioFormat {
    /// Mono 16-bit PCM at the given sample rate
    pub const fn mono_pcm16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: MONO_CHANNELS,
            bytes_per_sample: BYTES_PER_SAMPLE,
        }
    }

    /// Bytes of PCM produced per second of audio
    pub const fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * self.bytes_per_sample as usize
    }

    /// Bytes that make up one batch of `window_secs` seconds
    pub const fn batch_threshold_bytes(&self, window_secs: u32) -> usize {
        window_secs as usize * self.bytes_per_second()
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::mono_pcm16(DEFAULT_SAMPLE_RATE)
    }
}
