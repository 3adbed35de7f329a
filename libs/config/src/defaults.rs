//! Service defaults
//!
//! Default values for every configuration key, grouped by section. The structs in
//! [`crate::settings`] fall back to these when a key is absent from both the file and
//! the environment.

/// MQTT broker defaults
pub mod broker {
    pub const HOST: &str = "127.0.0.1";
    pub const PORT: u16 = 1883;
    pub const CLIENT_ID: &str = "earshot-ingest";

    /// MQTT keep-alive (seconds)
    pub const KEEP_ALIVE_SECS: u64 = 30;

    /// How long startup waits for the first ConnAck (milliseconds)
    pub const CONNECT_TIMEOUT_MS: u64 = 5_000;

    /// Capacity of the client's outgoing request queue
    pub const REQUEST_CAPACITY: usize = 64;
}

/// Analyzer service defaults
pub mod analyzer {
    pub const URL: &str = "http://127.0.0.1:50051";
    pub const CONNECT_TIMEOUT_MS: u64 = 2_000;
    pub const VERIFY_ON_STARTUP: bool = true;

    /// Deadline for the startup liveness call (milliseconds)
    pub const LIVENESS_TIMEOUT_MS: u64 = 5_000;
}

/// Gateway (sensor directory) defaults
pub mod gateway {
    pub const URL: &str = "http://127.0.0.1:50052";
    pub const CONNECT_TIMEOUT_MS: u64 = 2_000;
}

/// Ingest pipeline defaults
pub mod pipeline {
    /// Status updates waiting for the gateway
    pub const STATUS_QUEUE_CAPACITY: usize = 256;
}

/// Health endpoint defaults
pub mod health {
    pub const ENABLED: bool = false;
    pub const PORT: u16 = 8090;
}

/// Logging defaults
pub mod log {
    pub const LEVEL: &str = "info";
}
