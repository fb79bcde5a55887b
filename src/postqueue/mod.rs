//! Snapshot Producer
//!
//! `PostQueue` is the client side of `postqueue -p`: it opens one showq
//! connection per pass and hands back every queued message, either as a
//! list (`produce`) or by fanning entries out to parallel workers that run
//! a visitor on each (`each_produce`).

mod latch;
pub mod transport;

pub use latch::Latch;
pub use transport::{
    AnyStream, AnyTransport, MemoryTransport, ShowqAddress, TcpTransport, Transport,
    UnixSocketTransport, DEFAULT_SHOWQ_PATH,
};

use crate::showq::{DecodeError, QueueEntry, ReadStep, ShowqReader};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, trace};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The showq endpoint could not be reached
    #[error("failed to connect to showq at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl QueueError {
    pub fn is_transport(&self) -> bool {
        match self {
            QueueError::Connect { .. } => true,
            QueueError::Decode(e) => e.is_transport(),
        }
    }
}

/// Number of workers used by `each_produce` when not overridden
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Postfix queue listing client
pub struct PostQueue<T> {
    transport: T,
    workers: usize,
}

impl<T: Transport> PostQueue<T> {
    pub fn new(transport: T) -> Self {
        PostQueue {
            transport,
            workers: default_parallelism(),
        }
    }

    /// Override the worker count used by `each_produce` (minimum 1)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    async fn connect(&self) -> Result<ShowqReader<T::Stream>, QueueError> {
        let stream = self
            .transport
            .connect()
            .await
            .map_err(|source| QueueError::Connect {
                endpoint: self.transport.endpoint(),
                source,
            })?;
        Ok(ShowqReader::new(stream))
    }

    /// Read the whole listing sequentially, in stream order.
    ///
    /// The connection is dropped on every return path.
    pub async fn produce(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let reader = self.connect().await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.read().await? {
            entries.push(entry);
        }
        debug!(endpoint = %self.endpoint(), count = entries.len(), "Read queue listing");
        Ok(entries)
    }

    /// Read the listing with `workers` tasks sharing one reader, calling
    /// `visitor` on every entry.
    ///
    /// The visitor runs concurrently on several tasks and sees entries in
    /// no particular order across tasks. The first worker to reach the end
    /// of the listing or an error latches that outcome; the rest stop
    /// pulling. Returns once every worker has stopped.
    pub async fn each_produce<F>(&self, visitor: F) -> Result<(), QueueError>
    where
        F: Fn(QueueEntry) + Send + Sync + 'static,
    {
        let reader = Arc::new(self.connect().await?);
        let visitor = Arc::new(visitor);
        let outcome: Arc<Latch<Result<(), DecodeError>>> = Arc::new(Latch::new());

        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers {
            let reader = reader.clone();
            let visitor = visitor.clone();
            let outcome = outcome.clone();
            workers.spawn(async move {
                let mut visited = 0usize;
                while !outcome.is_set() {
                    match reader.next_step().await {
                        ReadStep::Entry(entry) => {
                            visitor(entry);
                            visited += 1;
                        }
                        ReadStep::End => {
                            outcome.set(Ok(()));
                            break;
                        }
                        ReadStep::Failed(e) => {
                            outcome.set(Err(e));
                            break;
                        }
                        ReadStep::Drained => break,
                    }
                }
                trace!(worker_id, visited, "showq worker stopped");
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
            }
        }
        drop(reader);

        // A worker only sees Drained after another one latched End or Failed
        outcome.take().unwrap_or(Ok(())).map_err(QueueError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::showq::{encode_listing, ArrivalTime, Recipient};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entries(n: usize) -> Vec<QueueEntry> {
        (0..n)
            .map(|i| QueueEntry {
                queue_name: if i % 2 == 0 { "deferred" } else { "active" }.to_string(),
                queue_id: format!("{:012X}", i),
                arrival_time: ArrivalTime::from_secs(i as i64),
                message_size: i as u64,
                forced_expire: false,
                sender: "foo@example.com".to_string(),
                recipients: vec![Recipient::new("bar@example.jp")],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_produce_keeps_stream_order() {
        let expected = entries(5);
        let queue = PostQueue::new(MemoryTransport::new(encode_listing(&expected).freeze()));
        assert_eq!(queue.produce().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_produce_empty_listing() {
        let queue = PostQueue::new(MemoryTransport::new(&b"\0"[..]));
        assert!(queue.produce().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_produce_decode_error_aborts() {
        let queue = PostQueue::new(MemoryTransport::new(&b"queue_name\0\0\0"[..]));
        assert!(matches!(
            queue.produce().await,
            Err(QueueError::Decode(DecodeError::OddFieldCount { .. }))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_produce_visits_every_entry_once() {
        let listing = encode_listing(&entries(1000)).freeze();
        let queue = PostQueue::new(MemoryTransport::new(listing)).with_workers(8);

        let count = Arc::new(AtomicUsize::new(0));
        let sum = Arc::new(AtomicUsize::new(0));
        let (c, s) = (count.clone(), sum.clone());
        queue
            .each_produce(move |entry| {
                c.fetch_add(1, Ordering::SeqCst);
                s.fetch_add(entry.message_size as usize, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1000);
        assert_eq!(sum.load(Ordering::SeqCst), (0..1000).sum::<usize>());
    }

    #[tokio::test]
    async fn test_each_produce_reports_first_error() {
        let mut wire = encode_listing(&entries(3)).to_vec();
        // Replace the end marker with a bad record
        wire.pop();
        wire.extend_from_slice(b"size\0big\0\0\0");
        let queue = PostQueue::new(MemoryTransport::new(wire)).with_workers(4);

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let err = queue
            .each_produce(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::Decode(DecodeError::InvalidValue { key: "size", .. })
        ));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_produce_more_workers_than_entries() {
        let cases = [
            (encode_listing(&entries(1)).freeze(), 1),
            (bytes::Bytes::from_static(b"\0"), 0),
        ];
        for (listing, expected) in cases {
            let queue = PostQueue::new(MemoryTransport::new(listing)).with_workers(16);
            let count = Arc::new(AtomicUsize::new(0));
            let c = count.clone();
            queue
                .each_produce(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            assert_eq!(count.load(Ordering::SeqCst), expected);
        }
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let queue = PostQueue::new(UnixSocketTransport::new(dir.path().join("showq")));
        let err = queue.each_produce(|_| {}).await.unwrap_err();
        assert!(matches!(err, QueueError::Connect { .. }));
        assert!(err.is_transport());
    }

    #[test]
    fn test_worker_count_floor() {
        let queue = PostQueue::new(MemoryTransport::new(&b"\0"[..])).with_workers(0);
        assert_eq!(queue.workers(), 1);
        assert!(default_parallelism() >= 1);
    }
}
