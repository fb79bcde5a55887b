use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

/// Raw samples partitioned by label value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    samples: BTreeMap<String, Vec<f64>>,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, label: &str, value: f64) {
        match self.samples.get_mut(label) {
            Some(values) => values.push(value),
            None => {
                self.samples.insert(label.to_string(), vec![value]);
            }
        }
    }

    /// Samples for one label, in observation order
    pub fn samples(&self, label: &str) -> &[f64] {
        self.samples.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.samples.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Total samples across all labels
    pub fn count(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn sum(&self, label: &str) -> f64 {
        self.samples(label).iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// What one tick of the queue job observed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotState {
    /// Message size in bytes, by queue name
    pub size_bytes: Distribution,
    /// Seconds since arrival at sample time, by queue name
    pub age_seconds: Distribution,
    pub success: bool,
    pub duration: Duration,
    /// Entries read during the pass, including a failed one
    pub entries: usize,
    /// `None` until the first tick has finished
    pub completed_at: Option<SystemTime>,
}

impl SnapshotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Drop every sample, keeping the outcome fields
    pub fn discard_samples(&mut self) {
        self.size_bytes.clear();
        self.age_seconds.clear();
    }
}
