//! Mock showq server for integration tests

#![allow(dead_code)]

use bytes::BytesMut;
use postfix_queue_exporter::showq::{encode_listing, ArrivalTime, QueueEntry, Recipient};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

/// `n` copies of the canonical test entry
pub fn message_gen(n: usize) -> Vec<QueueEntry> {
    (0..n)
        .map(|_| QueueEntry {
            queue_name: "deferred".to_string(),
            queue_id: "09229268B721".to_string(),
            arrival_time: ArrivalTime::EPOCH,
            message_size: 0,
            forced_expire: false,
            sender: "foo@example.com".to_string(),
            recipients: vec![Recipient::new("bar@example.jp")],
        })
        .collect()
}

/// A showq socket in a temporary directory. Each accepted connection is
/// answered with the listing produced by `listing(connection_number)`.
pub struct MockShowq {
    pub path: PathBuf,
    pub connections: Arc<AtomicUsize>,
    _dir: TempDir,
    task: JoinHandle<()>,
}

impl MockShowq {
    pub fn serve(entries: Vec<QueueEntry>) -> Self {
        let listing = encode_listing(&entries);
        Self::serve_with(move |_| listing.clone(), Duration::ZERO)
    }

    pub fn serve_raw(bytes: Vec<u8>) -> Self {
        Self::serve_with(move |_| BytesMut::from(&bytes[..]), Duration::ZERO)
    }

    pub fn serve_with<F>(listing: F, delay: Duration) -> Self
    where
        F: Fn(usize) -> BytesMut + Send + Sync + 'static,
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("showq");
        let listener = UnixListener::bind(&path).unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        let listing = Arc::new(listing);

        let task = tokio::spawn(async move {
            loop {
                let (mut conn, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let body = listing(n);
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = conn.write_all(&body).await;
                    let _ = conn.shutdown().await;
                });
            }
        });

        MockShowq {
            path,
            connections,
            _dir: dir,
            task,
        }
    }
}

impl Drop for MockShowq {
    fn drop(&mut self) {
        self.task.abort();
    }
}
