//! Simulated sensor for local runs
//!
//! Announces itself online, publishes sequenced 16 kHz mono PCM frames of a sine tone
//! and announces itself offline on CTRL+C (or after `--packets` frames).
//!
//! Usage:
//!   sensor_sim --sensor-id 1
//!   sensor_sim --sensor-id 2 --host broker --packets 500 --skip-every 100

use anyhow::{Context, Result};
use clap::Parser;
use codec::{encode_packet, TopicLayout, DEFAULT_AUDIO_PREFIX, DEFAULT_PRESENCE_PREFIX};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::f32::consts::PI;
use std::time::Duration;
use tracing::{info, warn};
use types::{PresenceStatus, SensorId, DEFAULT_SAMPLE_RATE};

/// Samples per published frame
const FRAME_SAMPLES: usize = 1024;
/// Frame period; 1024 samples at 16 kHz
const FRAME_PERIOD: Duration = Duration::from_millis(64);

#[derive(Parser, Debug)]
#[command(name = "sensor_sim")]
#[command(about = "Publishes synthetic audio as an Earshot sensor")]
struct Args {
    /// Sensor id used in topics and the client id
    #[arg(long)]
    sensor_id: i32,

    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = 1883)]
    port: u16,

    /// Stop after this many frames
    #[arg(long)]
    packets: Option<u64>,

    /// Skip one sequence number every N frames to exercise gap handling
    #[arg(long)]
    skip_every: Option<u64>,

    /// Tone frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    tone_hz: f32,

    #[arg(long, default_value = DEFAULT_AUDIO_PREFIX)]
    audio_prefix: String,

    #[arg(long, default_value = DEFAULT_PRESENCE_PREFIX)]
    presence_prefix: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let sensor = SensorId::new(args.sensor_id);
    let layout = TopicLayout::new(&args.audio_prefix, &args.presence_prefix);

    let mut options = MqttOptions::new(
        format!("sensor-{}", args.sensor_id),
        args.host.clone(),
        args.port,
    );
    options.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(options, 64);

    let poller = tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                warn!("Broker connection error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    let presence_topic = layout.presence_topic(sensor);
    let audio_topic = layout.audio_topic(sensor);

    client
        .publish(
            &presence_topic,
            QoS::AtLeastOnce,
            false,
            PresenceStatus::Online.as_str(),
        )
        .await
        .context("Failed to announce online")?;
    info!(%sensor, "announced online on {}", presence_topic);

    let mut tone = ToneGenerator::new(args.tone_hz, DEFAULT_SAMPLE_RATE);
    let mut ticker = tokio::time::interval(FRAME_PERIOD);
    let mut sequence: u32 = 0;
    let mut sent: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                if let Some(every) = args.skip_every {
                    if every > 0 && sent > 0 && sent % every == 0 {
                        sequence = sequence.wrapping_add(1);
                    }
                }
                let frame = encode_packet(sequence, &tone.next_frame(FRAME_SAMPLES));
                client
                    .publish(&audio_topic, QoS::AtLeastOnce, false, frame)
                    .await
                    .context("Failed to publish audio frame")?;
                sequence = sequence.wrapping_add(1);
                sent += 1;

                if args.packets.is_some_and(|limit| sent >= limit) {
                    break;
                }
            }
        }
    }

    client
        .publish(
            &presence_topic,
            QoS::AtLeastOnce,
            false,
            PresenceStatus::Offline.as_str(),
        )
        .await
        .context("Failed to announce offline")?;
    // Let the event loop flush the offline notice before disconnecting
    tokio::time::sleep(Duration::from_millis(200)).await;
    if let Err(e) = client.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }
    poller.abort();

    info!(%sensor, frames = sent, "sensor stopped");
    Ok(())
}

/// Phase-continuous sine source producing s16le mono frames
struct ToneGenerator {
    phase: f32,
    step: f32,
}

impl ToneGenerator {
    fn new(frequency: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: 2.0 * PI * frequency / sample_rate as f32,
        }
    }

    fn next_frame(&mut self, samples: usize) -> Vec<u8> {
        let mut pcm = Vec::with_capacity(samples * 2);
        for _ in 0..samples {
            let sample = (self.phase.sin() * i16::MAX as f32 * 0.5) as i16;
            pcm.extend_from_slice(&sample.to_le_bytes());
            self.phase = (self.phase + self.step) % (2.0 * PI);
        }
        pcm
    }
}
