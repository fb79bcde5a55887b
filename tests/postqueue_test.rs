//! Producer tests against a real Unix socket

mod common;

use common::{message_gen, MockShowq};
use postfix_queue_exporter::postqueue::{PostQueue, QueueError, UnixSocketTransport};
use postfix_queue_exporter::showq::{DecodeError, Recipient};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_produce_single_entry() {
    let server = MockShowq::serve(message_gen(1));
    let queue = PostQueue::new(UnixSocketTransport::new(&server.path));

    let messages = queue.produce().await.unwrap();
    assert_eq!(messages, message_gen(1));
    assert_eq!(messages[0].recipients, vec![Recipient::new("bar@example.jp")]);
    assert_eq!(messages[0].arrival_time.as_secs(), 0);
}

#[tokio::test]
async fn test_produce_three_entries() {
    let server = MockShowq::serve(message_gen(3));
    let queue = PostQueue::new(UnixSocketTransport::new(&server.path));
    assert_eq!(queue.produce().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_produce_opens_fresh_connection_each_pass() {
    let server = MockShowq::serve(message_gen(2));
    let queue = PostQueue::new(UnixSocketTransport::new(&server.path));
    queue.produce().await.unwrap();
    queue.produce().await.unwrap();
    assert_eq!(server.connections.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_produce_counts_every_entry() {
    let server = MockShowq::serve(message_gen(500));
    let queue = PostQueue::new(UnixSocketTransport::new(&server.path));

    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    queue
        .each_produce(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 500);
}

#[tokio::test]
async fn test_each_produce_empty_queue() {
    let server = MockShowq::serve(Vec::new());
    let queue = PostQueue::new(UnixSocketTransport::new(&server.path)).with_workers(3);

    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    queue
        .each_produce(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_each_produce_unknown_key() {
    let server = MockShowq::serve_raw(b"queue_name\0deferred\0color\0red\0\0\0".to_vec());
    let queue = PostQueue::new(UnixSocketTransport::new(&server.path)).with_workers(2);

    match queue.each_produce(|_| {}).await {
        Err(QueueError::Decode(DecodeError::UnknownKey { key, .. })) => assert_eq!(key, "color"),
        other => panic!("expected UnknownKey, got {:?}", other),
    }
}

#[tokio::test]
async fn test_truncated_stream_is_transport_failure() {
    let server = MockShowq::serve_raw(b"queue_name\0deferred\0queue_id\0".to_vec());
    let queue = PostQueue::new(UnixSocketTransport::new(&server.path));

    let err = queue.produce().await.unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(err, QueueError::Decode(DecodeError::Io(_))));
}

#[tokio::test]
async fn test_missing_socket() {
    let dir = tempfile::tempdir().unwrap();
    let queue = PostQueue::new(UnixSocketTransport::new(dir.path().join("showq")));
    assert!(matches!(
        queue.produce().await,
        Err(QueueError::Connect { .. })
    ));
}
