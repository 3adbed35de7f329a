//! # Earshot Ingest Configuration
//!
//! Layered configuration for the audio ingest service: built-in defaults, an optional
//! TOML file, then `EARSHOT__SECTION__KEY` environment overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ingest_config::IngestConfig;
//! use std::path::Path;
//!
//! let config = IngestConfig::load(Some(Path::new("config/ingest.toml")))?;
//! let threshold = config.pipeline.batch_threshold_bytes();
//! let layout = config.broker.topic_layout();
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Sections
//!
//! - **broker**: MQTT host, client id, topic prefixes
//! - **analyzer** / **gateway**: downstream gRPC endpoints
//! - **pipeline**: sample rate, batch window, queue capacities, worker retention
//! - **health** / **log**: ambient service settings

pub mod defaults;
pub mod settings;

// Re-export commonly used types
pub use settings::{
    load_config, AnalyzerConfig, BrokerConfig, ConfigError, GatewayConfig, HealthConfig,
    IngestConfig, LogConfig, PipelineConfig, WorkerRetention, ENV_PREFIX, ENV_SEPARATOR,
};
