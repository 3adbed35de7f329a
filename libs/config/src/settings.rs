//! Ingest Configuration Module
//!
//! Loads the ingest service configuration from an optional TOML file with
//! environment variable overrides (`EARSHOT__SECTION__KEY`).

use crate::defaults;
use anyhow::{Context, Result};
use codec::{TopicLayout, DEFAULT_AUDIO_PREFIX, DEFAULT_PRESENCE_PREFIX};
use config_rs::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use types::{AudioFormat, DEFAULT_BATCH_WINDOW_SECS, DEFAULT_QUEUE_CAPACITY, DEFAULT_SAMPLE_RATE};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "EARSHOT";

/// Separator between prefix, section and key in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Shortest MQTT keep-alive the client accepts
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Rejected configuration values
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Main ingest configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub broker: BrokerConfig,
    pub analyzer: AnalyzerConfig,
    pub gateway: GatewayConfig,
    pub pipeline: PipelineConfig,
    pub health: HealthConfig,
    pub log: LogConfig,
}

/// MQTT broker connection and topic layout
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub audio_topic_prefix: String,
    pub presence_topic_prefix: String,
    pub connect_timeout_ms: u64,
    pub request_capacity: usize,
}

/// Downstream analysis service
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub url: String,
    pub connect_timeout_ms: u64,
    /// Issue the liveness call before accepting sensors
    pub verify_on_startup: bool,
    pub liveness_timeout_ms: u64,
}

/// Sensor directory service
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: String,
    pub connect_timeout_ms: u64,
}

/// What happens to a sensor's worker when the sensor goes offline
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRetention {
    /// Keep the worker's queue open until process exit
    #[default]
    Linger,
    /// Close the queue so the worker drains and exits
    Close,
}

/// Per-sensor batching and queueing
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    pub batch_window_secs: u32,
    /// Capacity of each sensor's inbound packet queue
    pub queue_capacity: usize,
    pub status_queue_capacity: usize,
    pub worker_retention: WorkerRetention,
}

/// Optional HTTP health endpoint
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: defaults::broker::HOST.to_string(),
            port: defaults::broker::PORT,
            client_id: defaults::broker::CLIENT_ID.to_string(),
            keep_alive_secs: defaults::broker::KEEP_ALIVE_SECS,
            audio_topic_prefix: DEFAULT_AUDIO_PREFIX.to_string(),
            presence_topic_prefix: DEFAULT_PRESENCE_PREFIX.to_string(),
            connect_timeout_ms: defaults::broker::CONNECT_TIMEOUT_MS,
            request_capacity: defaults::broker::REQUEST_CAPACITY,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            url: defaults::analyzer::URL.to_string(),
            connect_timeout_ms: defaults::analyzer::CONNECT_TIMEOUT_MS,
            verify_on_startup: defaults::analyzer::VERIFY_ON_STARTUP,
            liveness_timeout_ms: defaults::analyzer::LIVENESS_TIMEOUT_MS,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: defaults::gateway::URL.to_string(),
            connect_timeout_ms: defaults::gateway::CONNECT_TIMEOUT_MS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            batch_window_secs: DEFAULT_BATCH_WINDOW_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            status_queue_capacity: defaults::pipeline::STATUS_QUEUE_CAPACITY,
            worker_retention: WorkerRetention::default(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::health::ENABLED,
            port: defaults::health::PORT,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: defaults::log::LEVEL.to_string(),
            json: false,
        }
    }
}

impl BrokerConfig {
    pub fn topic_layout(&self) -> TopicLayout {
        TopicLayout::new(&self.audio_topic_prefix, &self.presence_topic_prefix)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl AnalyzerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }
}

impl GatewayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl PipelineConfig {
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::mono_pcm16(self.sample_rate)
    }

    /// Bytes a worker accumulates before cutting a batch
    pub fn batch_threshold_bytes(&self) -> usize {
        self.audio_format()
            .batch_threshold_bytes(self.batch_window_secs)
    }
}

impl IngestConfig {
    /// Load configuration with `EARSHOT__` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration, reading overrides from `<prefix>__SECTION__KEY`
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading ingest config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        } else {
            debug!("No config file given, using defaults and environment");
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut config: IngestConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.expand_env_vars()?;
        config.validate().context("Configuration rejected")?;

        Ok(config)
    }

    /// Parse a TOML document directly, without environment overrides
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: IngestConfig =
            toml::from_str(text).context("Failed to parse TOML configuration")?;
        config.expand_env_vars()?;
        config.validate().context("Configuration rejected")?;
        Ok(config)
    }

    /// Expand `${VAR}` references in endpoint strings
    pub fn expand_env_vars(&mut self) -> Result<()> {
        self.broker.host = expand(&self.broker.host, "broker.host")?;
        self.broker.client_id = expand(&self.broker.client_id, "broker.client_id")?;
        self.analyzer.url = expand(&self.analyzer.url, "analyzer.url")?;
        self.gateway.url = expand(&self.gateway.url, "gateway.url")?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::invalid("broker.host", "must not be empty"));
        }
        if self.broker.client_id.trim().is_empty() {
            return Err(ConfigError::invalid("broker.client_id", "must not be empty"));
        }
        if self.broker.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(ConfigError::invalid(
                "broker.keep_alive_secs",
                format!("must be at least {}", MIN_KEEP_ALIVE_SECS),
            ));
        }
        if self.broker.request_capacity == 0 {
            return Err(ConfigError::invalid(
                "broker.request_capacity",
                "must be greater than zero",
            ));
        }

        let layout = self.broker.topic_layout();
        if layout.audio_prefix().is_empty() {
            return Err(ConfigError::invalid(
                "broker.audio_topic_prefix",
                "must not be empty",
            ));
        }
        if layout.presence_prefix().is_empty() {
            return Err(ConfigError::invalid(
                "broker.presence_topic_prefix",
                "must not be empty",
            ));
        }
        if layout.audio_prefix() == layout.presence_prefix() {
            return Err(ConfigError::invalid(
                "broker.presence_topic_prefix",
                "must differ from the audio topic prefix",
            ));
        }

        check_url("analyzer.url", &self.analyzer.url)?;
        check_url("gateway.url", &self.gateway.url)?;

        if self.pipeline.sample_rate == 0 {
            return Err(ConfigError::invalid(
                "pipeline.sample_rate",
                "must be greater than zero",
            ));
        }
        if self.pipeline.batch_window_secs == 0 {
            return Err(ConfigError::invalid(
                "pipeline.batch_window_secs",
                "must be greater than zero",
            ));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "pipeline.queue_capacity",
                "must be greater than zero",
            ));
        }
        if self.pipeline.status_queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "pipeline.status_queue_capacity",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Convenience function to load configuration with defaults
pub fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    IngestConfig::load(path)
}

fn expand(value: &str, field: &str) -> Result<String> {
    let expanded = shellexpand::env(value)
        .with_context(|| format!("Failed to expand environment variables in {}", field))?;
    Ok(expanded.into_owned())
}

fn check_url(field: &'static str, url: &str) -> std::result::Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("'{}' must start with http:// or https://", url),
        ))
    }
}
