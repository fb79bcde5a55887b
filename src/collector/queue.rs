use super::state::SnapshotState;
use crate::observability::mask_addresses;
use crate::observability::recorder::{MetricDesc, MetricType, MetricsRecorder, SharedMetrics};
use crate::postqueue::{PostQueue, QueueError, Transport};
use crate::scheduler::Job;
use crate::showq::QueueEntry;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info_span, Instrument};

/// Job name used for the `collector` label
pub const JOB_NAME: &str = "postfix_queue";

pub const SIZE_BYTES: &str = "postfix_queue_size_bytes";
pub const AGE_SECONDS: &str = "postfix_queue_age_seconds";
pub const COLLECTOR_DURATION: &str = "postfix_scope_collector_duration_seconds";
pub const COLLECTOR_SUCCESS: &str = "postfix_scope_collector_success";

const DESCRIPTORS: [MetricDesc; 4] = [
    MetricDesc {
        name: SIZE_BYTES,
        help: "Total message size in the queue.",
        metric_type: MetricType::Histogram,
        label: "queue_name",
        buckets: &[1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9],
    },
    MetricDesc {
        name: AGE_SECONDS,
        help: "Age of messages in the queue, in seconds.",
        metric_type: MetricType::Histogram,
        label: "queue_name",
        buckets: &[1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8],
    },
    MetricDesc {
        name: COLLECTOR_DURATION,
        help: "postfix_exporter: Duration of a collector scrape.",
        metric_type: MetricType::Gauge,
        label: "collector",
        buckets: &[],
    },
    MetricDesc {
        name: COLLECTOR_SUCCESS,
        help: "postfix_exporter: Whether a collector succeeded.",
        metric_type: MetricType::Gauge,
        label: "collector",
        buckets: &[],
    },
];

/// Samples the Postfix queue and holds the last finished snapshot.
///
/// Readers only ever see a whole snapshot; the new state replaces the old
/// one in a single write once the pass is over, whether it succeeded or
/// not. One pass at a time is the scheduler's job: concurrent direct calls
/// to `collect_snapshot` each still publish a whole snapshot, in
/// completion order.
pub struct QueueCollector<T> {
    postqueue: PostQueue<T>,
    published: RwLock<Arc<SnapshotState>>,
    recorder: Option<SharedMetrics>,
}

impl<T: Transport> QueueCollector<T> {
    pub fn new(postqueue: PostQueue<T>) -> Self {
        QueueCollector {
            postqueue,
            published: RwLock::new(Arc::new(SnapshotState::new())),
            recorder: None,
        }
    }

    /// Replay every published snapshot into `recorder` as soon as the pass
    /// that produced it ends
    pub fn with_recorder(mut self, recorder: SharedMetrics) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// One full pass: sample the queue, publish, push to the recorder.
    ///
    /// The outcome is always recorded in the published state; the error is
    /// returned as well for callers that want it.
    pub async fn collect_snapshot(&self) -> Result<usize, QueueError> {
        let result = self
            .sample()
            .instrument(info_span!("collector.tick", job = JOB_NAME))
            .await;
        if let Some(recorder) = &self.recorder {
            self.collect(recorder.as_ref());
        }
        result
    }

    async fn sample(&self) -> Result<usize, QueueError> {
        debug!("Start collecting");
        let started = Instant::now();
        let now = SystemTime::now();

        let working = Arc::new(Mutex::new(SnapshotState::new()));
        let sink = working.clone();
        let result = self
            .postqueue
            .each_produce(move |entry| {
                log_entry(&entry);
                let age = entry.arrival_time.age_at(now);
                let mut state = sink.lock();
                state.size_bytes.observe(&entry.queue_name, entry.message_size as f64);
                state.age_seconds.observe(&entry.queue_name, age);
                state.entries += 1;
            })
            .await;

        let mut state = std::mem::take(&mut *working.lock());
        state.success = result.is_ok();
        if let Err(e) = &result {
            state.discard_samples();
            match e {
                QueueError::Decode(decode) => match decode.record() {
                    Some(record) => error!(error = %e, record = %record.masked(), "Failed to collect postfix queue"),
                    None => error!(error = %e, "Failed to collect postfix queue"),
                },
                _ => error!(error = %e, "Failed to collect postfix queue"),
            }
        }
        state.duration = started.elapsed();
        state.completed_at = Some(SystemTime::now());

        let entries = state.entries;
        let duration = state.duration;
        *self.published.write() = Arc::new(state);

        debug!(
            length = entries,
            duration = duration.as_secs_f64(),
            success = result.is_ok(),
            "Finish collecting"
        );
        result.map(|()| entries)
    }

    /// The last published snapshot
    pub fn snapshot(&self) -> Arc<SnapshotState> {
        self.published.read().clone()
    }

    /// Metrics this collector emits
    pub fn describe(&self) -> Vec<MetricDesc> {
        let _state = self.published.read();
        DESCRIPTORS.to_vec()
    }

    /// Replay the last published snapshot into `recorder`
    pub fn collect(&self, recorder: &dyn MetricsRecorder) {
        let state = self.published.read();

        for (queue, samples) in state.age_seconds.iter() {
            let tag = format!("queue_name:{}", queue);
            for value in samples {
                recorder.histogram(AGE_SECONDS, *value, &[&tag]);
            }
        }
        for (queue, samples) in state.size_bytes.iter() {
            let tag = format!("queue_name:{}", queue);
            for value in samples {
                recorder.histogram(SIZE_BYTES, *value, &[&tag]);
            }
        }

        if state.is_complete() {
            let tag = format!("collector:{}", JOB_NAME);
            recorder.gauge(COLLECTOR_DURATION, state.duration.as_secs_f64(), &[&tag]);
            recorder.gauge(COLLECTOR_SUCCESS, if state.success { 1.0 } else { 0.0 }, &[&tag]);
        }
    }

    pub fn endpoint(&self) -> String {
        self.postqueue.endpoint()
    }
}

impl<T: Transport> Job for QueueCollector<T> {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    fn run(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            // Outcome already recorded and logged
            let _ = self.collect_snapshot().await;
        })
    }
}

fn log_entry(entry: &QueueEntry) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let masked = entry.redacted(mask_addresses);
    match serde_json::to_string(&masked) {
        Ok(item) => debug!(%item, "Collected item"),
        Err(e) => debug!(error = %e, queue_id = %entry.queue_id, "Collected item"),
    }
}
