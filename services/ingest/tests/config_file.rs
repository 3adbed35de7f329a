//! The shipped configuration file loads and matches the built-in defaults

use ingest_config::{IngestConfig, WorkerRetention};
use std::path::PathBuf;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/ingest.toml")
}

#[test]
fn test_shipped_config_loads() {
    let config = IngestConfig::load_with_prefix(Some(shipped_config().as_path()), "EARSHOT_SHIPPED_TEST")
        .unwrap();

    assert_eq!(config.broker.port, 1883);
    assert_eq!(config.pipeline.batch_threshold_bytes(), 320_000);
    assert_eq!(config.pipeline.worker_retention, WorkerRetention::Linger);
    assert!(config.health.enabled);
}

#[test]
fn test_shipped_config_only_differs_in_hosts_and_health() {
    let shipped = IngestConfig::load_with_prefix(Some(shipped_config().as_path()), "EARSHOT_SHIPPED_TEST")
        .unwrap();
    let defaults = IngestConfig::default();

    assert_eq!(shipped.pipeline, defaults.pipeline);
    assert_eq!(shipped.log, defaults.log);
    assert_eq!(shipped.broker.audio_topic_prefix, defaults.broker.audio_topic_prefix);
    assert_eq!(shipped.broker.presence_topic_prefix, defaults.broker.presence_topic_prefix);
}
