//! Protocol layer for sensor traffic
//!
//! Wire-level constants and the messages that flow from the transport, through the
//! per-sensor workers, to the downstream analyzer.

pub mod constants;
pub mod message;

pub use constants::*;
pub use message::*;
