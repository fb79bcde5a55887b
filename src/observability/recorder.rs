//! Metrics Recorder Trait
//!
//! The collector does not own an exposition format. It replays its current
//! snapshot into a `MetricsRecorder`, after every pass and on demand:
//! - Production: `StatsdMetrics`, which pushes to a DogStatsD agent
//! - Tests: `SimulatedMetrics`, which keeps everything in memory
//!
//! Distributions are emitted as raw samples; bucketing belongs to the
//! recorder.

use parking_lot::Mutex;
use std::sync::Arc;

/// Sink for one metrics read
pub trait MetricsRecorder: Send + Sync {
    /// Record one observation of a distribution
    fn histogram(&self, name: &str, value: f64, tags: &[&str]);

    /// Set a gauge value
    fn gauge(&self, name: &str, value: f64, tags: &[&str]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Histogram,
    Gauge,
}

/// Static description of one exported metric
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub metric_type: MetricType,
    pub label: &'static str,
    /// Suggested bucket upper bounds, histograms only
    pub buckets: &'static [f64],
}

/// No-op metrics recorder
#[derive(Clone, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    #[inline]
    fn histogram(&self, _name: &str, _value: f64, _tags: &[&str]) {}
    #[inline]
    fn gauge(&self, _name: &str, _value: f64, _tags: &[&str]) {}
}

/// Recorded metric for testing
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMetric {
    pub name: String,
    pub value: f64,
    pub tags: Vec<String>,
    pub metric_type: MetricType,
}

/// In-memory recorder - keeps every call for verification
#[derive(Default)]
pub struct SimulatedMetrics {
    recorded: Mutex<Vec<RecordedMetric>>,
}

impl SimulatedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded metrics
    pub fn get_recorded(&self) -> Vec<RecordedMetric> {
        self.recorded.lock().clone()
    }

    /// Get metrics by name
    pub fn get_by_name(&self, name: &str) -> Vec<RecordedMetric> {
        self.recorded
            .lock()
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    /// Values recorded under `name` carrying `tag`
    pub fn values(&self, name: &str, tag: &str) -> Vec<f64> {
        self.recorded
            .lock()
            .iter()
            .filter(|m| m.name == name && m.tags.iter().any(|t| t == tag))
            .map(|m| m.value)
            .collect()
    }

    /// Clear all recorded metrics
    pub fn clear(&self) {
        self.recorded.lock().clear();
    }

    fn push(&self, name: &str, value: f64, tags: &[&str], metric_type: MetricType) {
        self.recorded.lock().push(RecordedMetric {
            name: name.to_string(),
            value,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            metric_type,
        });
    }
}

impl MetricsRecorder for SimulatedMetrics {
    fn histogram(&self, name: &str, value: f64, tags: &[&str]) {
        self.push(name, value, tags, MetricType::Histogram);
    }

    fn gauge(&self, name: &str, value: f64, tags: &[&str]) {
        self.push(name, value, tags, MetricType::Gauge);
    }
}

/// Arc wrapper for trait object usage
pub type SharedMetrics = Arc<dyn MetricsRecorder>;
