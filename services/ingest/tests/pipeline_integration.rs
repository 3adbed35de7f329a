//! End-to-end pipeline behavior against in-process fakes

mod common;

use audio_ingest::worker::WorkerSummary;
use audio_ingest::{AudioOutcome, PresenceOutcome, Registration};
use codec::encode_packet;
use common::Harness;
use ingest_config::WorkerRetention;
use std::time::Duration;
use tokio_test::assert_ok;
use types::{PresenceStatus, SensorId};

const WINDOW_BYTES: usize = 320_000;

async fn join_all(harness: &mut Harness) -> Vec<WorkerSummary> {
    let mut summaries = Vec::new();
    for worker in harness.manager.drain() {
        let joined = tokio::time::timeout(Duration::from_secs(2), worker.handle).await;
        summaries.push(assert_ok!(assert_ok!(joined)));
    }
    summaries
}

#[tokio::test]
async fn test_short_stream_is_buffered_not_flushed() {
    let mut harness = Harness::new(10, WINDOW_BYTES, WorkerRetention::Linger);
    assert_eq!(
        harness.manager.handle_presence("sensors/status/7", b"online"),
        Some(PresenceOutcome::WorkerStarted)
    );

    for seq in 0..2 {
        let frame = encode_packet(seq, &[0x11; 100]);
        assert_eq!(
            harness.manager.handle_audio(SensorId::new(7), &frame),
            AudioOutcome::Queued
        );
    }

    let summaries = join_all(&mut harness).await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].packets, 2);
    assert_eq!(summaries[0].gaps, 0);
    assert_eq!(summaries[0].batches_sent, 0);
    assert_eq!(summaries[0].discarded_bytes, 200);
    assert!(harness.analyzer.received().is_empty());
}

#[tokio::test]
async fn test_window_flushes_one_batch_with_next_sequence() {
    let mut harness = Harness::new(16, 1_000, WorkerRetention::Linger);
    harness.manager.handle_presence("sensors/status/2", b"online");

    for seq in 0..5 {
        let frame = encode_packet(seq, &[seq as u8; 250]);
        harness.manager.handle_message("sensors/audio/2", &frame);
    }

    let summaries = join_all(&mut harness).await;
    assert_eq!(summaries[0].batches_sent, 1);
    assert_eq!(summaries[0].discarded_bytes, 250);

    let batches = harness.analyzer.received();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].sensor_id, SensorId::new(2));
    assert_eq!(batches[0].sequence_offset, 4);
    assert_eq!(batches[0].pcm.len(), 1_000);
    assert_eq!(&batches[0].pcm[..250], &[0u8; 250][..]);
    assert_eq!(&batches[0].pcm[750..], &[3u8; 250][..]);
    assert_eq!(harness.metrics.snapshot().bytes_forwarded, 1_000);
}

#[tokio::test]
async fn test_gap_resyncs_and_keeps_buffered_audio() {
    let mut harness = Harness::new(16, 12, WorkerRetention::Linger);
    harness.manager.handle_presence("sensors/status/1", b"online");

    for seq in [0u32, 1, 5] {
        let frame = encode_packet(seq, &[1, 2, 3, 4]);
        harness.manager.handle_audio(SensorId::new(1), &frame);
    }

    let summaries = join_all(&mut harness).await;
    assert_eq!(summaries[0].gaps, 1);

    let batches = harness.analyzer.received();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].sequence_offset, 6);
    assert_eq!(batches[0].pcm.len(), 12);
    assert_eq!(harness.metrics.snapshot().sequence_gaps, 1);
}

#[tokio::test]
async fn test_short_frame_is_dropped_before_lookup() {
    let mut harness = Harness::new(10, WINDOW_BYTES, WorkerRetention::Linger);
    harness.manager.handle_presence("sensors/status/9", b"online");

    assert_eq!(
        harness.manager.handle_audio(SensorId::new(9), &[0, 0, 1]),
        AudioOutcome::DecodeFailed
    );

    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.decode_failures, 1);
    assert_eq!(snapshot.packets_received, 1);

    let summaries = join_all(&mut harness).await;
    assert_eq!(summaries[0].packets, 0);
}

#[tokio::test]
async fn test_full_queue_drops_newest_packet() {
    let mut harness = Harness::new(2, WINDOW_BYTES, WorkerRetention::Linger);
    // Register without a worker so nothing drains the queue
    let registration = harness.registry.register_if_absent(SensorId::new(5));
    let Registration::Created { inbox, .. } = registration else {
        panic!("sensor 5 was already registered");
    };

    let outcomes: Vec<_> = (0..3)
        .map(|seq| {
            harness
                .manager
                .handle_audio(SensorId::new(5), &encode_packet(seq, &[0; 16]))
        })
        .collect();

    assert_eq!(
        outcomes,
        vec![
            AudioOutcome::Queued,
            AudioOutcome::Queued,
            AudioOutcome::QueueFull
        ]
    );
    assert_eq!(harness.metrics.snapshot().overload_drops, 1);
    assert_eq!(inbox.len(), 2);
}

#[tokio::test]
async fn test_audio_after_offline_is_unknown() {
    let mut harness = Harness::new(10, WINDOW_BYTES, WorkerRetention::Linger);
    let sensor = SensorId::new(7);
    let frame = encode_packet(0, &[0; 32]);

    harness.manager.handle_presence("sensors/status/7", b"online");
    assert_eq!(harness.manager.handle_audio(sensor, &frame), AudioOutcome::Queued);

    assert_eq!(
        harness.manager.handle_presence("sensors/status/7", b"offline"),
        Some(PresenceOutcome::Removed)
    );
    assert_eq!(
        harness.manager.handle_audio(sensor, &frame),
        AudioOutcome::UnknownSensor
    );
    assert!(harness.registry.lookup(sensor).is_none());
    assert_eq!(harness.metrics.snapshot().unknown_sensor_drops, 1);

    let requests = harness.manager.subscriber().requests.lock().clone();
    assert_eq!(requests, vec!["sub sensors/audio/7", "unsub sensors/audio/7"]);
}

#[tokio::test]
async fn test_duplicate_online_keeps_single_worker() {
    let mut harness = Harness::new(10, WINDOW_BYTES, WorkerRetention::Linger);

    harness.manager.handle_presence("sensors/status/4", b"online");
    assert_eq!(
        harness.manager.handle_presence("sensors/status/4", b"online"),
        Some(PresenceOutcome::AlreadyOnline)
    );

    assert_eq!(harness.registry.len(), 1);
    let summaries = join_all(&mut harness).await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(harness.metrics.snapshot().workers_started, 1);
}

#[tokio::test]
async fn test_close_retention_stops_worker_on_offline() {
    let mut harness = Harness::new(10, WINDOW_BYTES, WorkerRetention::Close);
    harness.manager.handle_presence("sensors/status/3", b"online");
    harness
        .manager
        .handle_audio(SensorId::new(3), &encode_packet(0, &[0; 64]));
    harness.manager.handle_presence("sensors/status/3", b"offline");
    assert_eq!(harness.manager.retired_count(), 0);

    let mut workers = harness.manager.drain();
    let worker = workers.pop().map(|w| w.handle);
    let summary = tokio::time::timeout(Duration::from_secs(2), worker.unwrap())
        .await
        .expect("worker should stop once its queue closes")
        .unwrap();
    assert_eq!(summary.packets, 1);
    assert_eq!(summary.discarded_bytes, 64);
}

#[tokio::test]
async fn test_linger_retention_keeps_worker_until_drain() {
    let mut harness = Harness::new(10, WINDOW_BYTES, WorkerRetention::Linger);
    harness.manager.handle_presence("sensors/status/3", b"online");
    harness.manager.handle_presence("sensors/status/3", b"offline");
    assert_eq!(harness.manager.retired_count(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.metrics.snapshot().workers_stopped, 0);

    let summaries = join_all(&mut harness).await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(harness.manager.retired_count(), 0);
    assert_eq!(harness.metrics.snapshot().workers_stopped, 1);
}

#[tokio::test]
async fn test_rejoin_after_offline_starts_fresh_stream() {
    let mut harness = Harness::new(10, 8, WorkerRetention::Close);
    let sensor = SensorId::new(6);

    harness.manager.handle_presence("sensors/status/6", b"online");
    harness.manager.handle_audio(sensor, &encode_packet(40, &[0; 4]));
    harness.manager.handle_presence("sensors/status/6", b"offline");
    assert_eq!(
        harness.manager.handle_presence("sensors/status/6", b"online"),
        Some(PresenceOutcome::WorkerStarted)
    );

    // The new worker starts at sequence 0 with an empty buffer
    harness.manager.handle_audio(sensor, &encode_packet(0, &[1; 4]));
    harness.manager.handle_audio(sensor, &encode_packet(1, &[2; 4]));

    let summaries = join_all(&mut harness).await;
    let total_gaps: u64 = summaries.iter().map(|s| s.gaps).sum();
    assert_eq!(total_gaps, 1);

    let batches = harness.analyzer.received();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].pcm, vec![1, 1, 1, 1, 2, 2, 2, 2]);
    assert_eq!(batches[0].sequence_offset, 2);
}

#[tokio::test]
async fn test_status_updates_reach_gateway_in_order() {
    let mut harness = Harness::new(10, WINDOW_BYTES, WorkerRetention::Close);
    let propagator = harness.propagator.take().map(|p| p.spawn());

    harness.manager.handle_presence("sensors/status/1", b"online");
    harness.manager.handle_presence("sensors/status/2", b"online");
    harness.manager.handle_presence("sensors/status/1", b"offline");
    harness.manager.handle_presence("sensors/status/5", b"offline");

    let _ = join_all(&mut harness).await;
    let Harness {
        manager, reporter, ..
    } = harness;
    drop(manager);

    let summary = tokio::time::timeout(Duration::from_secs(2), propagator.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.delivered, 4);

    assert_eq!(
        *reporter.updates.lock(),
        vec![
            (SensorId::new(1), PresenceStatus::Online),
            (SensorId::new(2), PresenceStatus::Online),
            (SensorId::new(1), PresenceStatus::Offline),
            (SensorId::new(5), PresenceStatus::Offline),
        ]
    );
}

#[tokio::test]
async fn test_unrelated_topic_is_ignored() {
    let mut harness = Harness::new(10, WINDOW_BYTES, WorkerRetention::Linger);
    harness.manager.handle_message("sensors/audiox/1", &encode_packet(0, &[0; 4]));
    harness.manager.handle_message("sensors/audio/abc", &encode_packet(0, &[0; 4]));

    assert!(harness.registry.is_empty());
    assert_eq!(harness.metrics.snapshot().decode_failures, 2);
    assert_eq!(harness.metrics.snapshot().packets_received, 0);
}
