//! # Sensor Identifiers
//!
//! Typed wrapper around the integer sensor id carried on every topic and every
//! downstream message.
//!
//! A sensor id is stable for the lifetime of a device's connection session. It is the
//! registry key inside the ingest service and the `sensor_id` field (`int32`) on the
//! analyzer and gateway RPCs, so the wrapper stores exactly an `i32`.
//!
//! ```rust
//! use types::SensorId;
//!
//! let id: SensorId = "42".parse().unwrap();
//! assert_eq!(id.inner(), 42);
//! assert_eq!(format!("{}", id), "sensor-42");
//! ```

use crate::common::errors::ValidationError;
use std::fmt;
use std::str::FromStr;

/// Identifier of one sensor device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SensorId(i32);

impl SensorId {
    /// Wrap a raw sensor id
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Raw id as sent on the wire
    pub const fn inner(self) -> i32 {
        self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sensor-{}", self.0)
    }
}

impl From<i32> for SensorId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<SensorId> for i32 {
    fn from(id: SensorId) -> Self {
        id.0
    }
}

/// Parses the decimal form used as the final segment of sensor topics
impl FromStr for SensorId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::EmptySensorId);
        }
        s.parse::<i32>()
            .map(SensorId)
            .map_err(|_| ValidationError::InvalidSensorId {
                input: s.to_string(),
            })
    }
}
