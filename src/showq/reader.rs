use super::codec::{ShowqCodec, ShowqFrame};
use super::entry::QueueEntry;
use super::error::DecodeError;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;

/// Result of one serialized read
#[derive(Debug)]
pub enum ReadStep {
    Entry(QueueEntry),
    /// This call consumed the end of the listing
    End,
    /// This call hit the error; the reader is now finished
    Failed(DecodeError),
    /// An earlier call already returned `End` or `Failed`
    Drained,
}

struct ReadCursor<R> {
    frames: FramedRead<R, ShowqCodec>,
    finished: bool,
}

/// Reads queue entries from a showq stream.
///
/// Holds a single read cursor. `read` may be called from many tasks at
/// once; calls are serialized and each returns one complete record. Once
/// the end of the listing or an error has been returned, every further
/// call returns `Ok(None)` without touching the stream.
pub struct ShowqReader<R> {
    cursor: Mutex<ReadCursor<R>>,
}

impl<R: AsyncRead + Unpin> ShowqReader<R> {
    pub fn new(inner: R) -> Self {
        ShowqReader {
            cursor: Mutex::new(ReadCursor {
                frames: FramedRead::new(inner, ShowqCodec::new()),
                finished: false,
            }),
        }
    }

    /// Next entry, `Ok(None)` at the end of the listing
    pub async fn read(&self) -> Result<Option<QueueEntry>, DecodeError> {
        match self.next_step().await {
            ReadStep::Entry(entry) => Ok(Some(entry)),
            ReadStep::End | ReadStep::Drained => Ok(None),
            ReadStep::Failed(e) => Err(e),
        }
    }

    /// Like `read`, but tells the caller whether it was the one that
    /// observed the end of the listing or the error.
    pub async fn next_step(&self) -> ReadStep {
        let mut cursor = self.cursor.lock().await;
        if cursor.finished {
            return ReadStep::Drained;
        }
        let next = cursor.frames.next().await;
        match next {
            Some(Ok(ShowqFrame::Entry(entry))) => ReadStep::Entry(entry),
            Some(Ok(ShowqFrame::End)) | None => {
                cursor.finished = true;
                ReadStep::End
            }
            Some(Err(e)) => {
                cursor.finished = true;
                ReadStep::Failed(e)
            }
        }
    }

    /// Whether a terminal outcome has already been returned
    pub async fn is_finished(&self) -> bool {
        self.cursor.lock().await.finished
    }
}
