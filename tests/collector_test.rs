//! Collector and scheduler tests against a mock showq socket

mod common;

use bytes::BytesMut;
use common::{message_gen, MockShowq};
use postfix_queue_exporter::collector::{QueueCollector, AGE_SECONDS, COLLECTOR_SUCCESS};
use postfix_queue_exporter::observability::SimulatedMetrics;
use postfix_queue_exporter::postqueue::{PostQueue, UnixSocketTransport};
use postfix_queue_exporter::showq::encode_listing;
use postfix_queue_exporter::{JobRegistry, Scheduler};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[tokio::test]
async fn test_one_tick_end_to_end() {
    let server = MockShowq::serve(message_gen(1));
    let collector = QueueCollector::new(PostQueue::new(UnixSocketTransport::new(&server.path)));

    let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs_f64();
    collector.collect_snapshot().await.unwrap();
    let after = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs_f64();

    let metrics = SimulatedMetrics::new();
    collector.collect(&metrics);

    let ages = metrics.values(AGE_SECONDS, "queue_name:deferred");
    assert_eq!(ages.len(), 1);
    assert!(ages[0] >= before.floor() - 1.0 && ages[0] <= after + 1.0);
    assert_eq!(
        metrics.values(COLLECTOR_SUCCESS, "collector:postfix_queue"),
        vec![1.0]
    );
}

#[tokio::test]
async fn test_unreachable_showq_records_failure() {
    let dir = tempfile::tempdir().unwrap();
    let collector = QueueCollector::new(PostQueue::new(UnixSocketTransport::new(
        dir.path().join("showq"),
    )));

    assert!(collector.collect_snapshot().await.is_err());
    let state = collector.snapshot();
    assert!(state.is_complete());
    assert!(!state.success);
    assert!(state.size_bytes.is_empty());
}

/// Every pass serves entries whose size is the pass number, slowly. A
/// snapshot mixing two passes would show two different sizes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scheduled_ticks_never_mix_passes() {
    const PER_PASS: usize = 20;
    let server = MockShowq::serve_with(
        |pass| {
            let mut entries = message_gen(PER_PASS);
            for e in &mut entries {
                e.message_size = pass as u64 + 1;
            }
            encode_listing(&entries)
        },
        Duration::from_millis(120),
    );

    let collector = Arc::new(QueueCollector::new(PostQueue::new(UnixSocketTransport::new(
        &server.path,
    ))));
    let mut registry = JobRegistry::new();
    registry
        .register(collector.clone(), Duration::from_millis(40))
        .unwrap();
    let scheduler = Scheduler::new(registry).with_initial_run(true).start();

    let reader = {
        let collector = collector.clone();
        tokio::spawn(async move {
            let mut observed = Vec::new();
            for _ in 0..60 {
                let state = collector.snapshot();
                let sizes = state.size_bytes.samples("deferred").to_vec();
                if state.is_complete() {
                    assert_eq!(sizes.len(), PER_PASS);
                    assert!(sizes.iter().all(|s| *s == sizes[0]), "mixed passes: {:?}", sizes);
                    observed.push(sizes[0]);
                } else {
                    assert!(sizes.is_empty());
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            observed
        })
    };

    let observed = reader.await.unwrap();
    scheduler.shutdown().await;

    // Passes are published in order, one at a time
    assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    assert!(observed.last().copied().unwrap_or(0.0) >= 2.0);
}

#[tokio::test]
async fn test_failed_tick_replaces_previous_samples() {
    let server = MockShowq::serve_with(
        |pass| {
            if pass == 0 {
                encode_listing(&message_gen(2))
            } else {
                BytesMut::from(&b"size\0huge\0\0\0"[..])
            }
        },
        Duration::ZERO,
    );
    let collector = QueueCollector::new(PostQueue::new(UnixSocketTransport::new(&server.path)));

    collector.collect_snapshot().await.unwrap();
    assert_eq!(collector.snapshot().size_bytes.count(), 2);

    assert!(collector.collect_snapshot().await.is_err());
    let state = collector.snapshot();
    assert!(!state.success);
    assert_eq!(state.size_bytes.count(), 0);
    assert_eq!(state.age_seconds.count(), 0);
}
