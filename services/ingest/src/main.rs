//! Audio ingest binary
//!
//! Usage:
//!   audio_ingest
//!   audio_ingest --config config/ingest.toml
//!   EARSHOT__BROKER__HOST=broker audio_ingest --json-logs

use anyhow::{Context, Result};
use audio_ingest::IngestService;
use clap::Parser;
use ingest_config::{load_config, IngestConfig};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "audio_ingest")]
#[command(about = "Earshot per-sensor audio ingest service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&args, &config);

    info!("Starting Earshot audio ingest");
    if let Some(path) = &args.config {
        info!("Configuration: {}", path.display());
    }
    info!(
        "Broker {}:{} audio={} presence={}",
        config.broker.host,
        config.broker.port,
        config.broker.audio_topic_prefix,
        config.broker.presence_topic_prefix
    );

    let service = IngestService::connect(config).await.map_err(|e| {
        error!("Startup failed: {}", e);
        e
    })?;

    let snapshot = service.run_until(shutdown_signal()).await?;
    info!(
        "Forwarded {} batches ({} bytes)",
        snapshot.batches_forwarded, snapshot.bytes_forwarded
    );
    Ok(())
}

fn init_logging(args: &Args, config: &IngestConfig) {
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.log.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json_logs || config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {}", e);
    }
}
