//! Queue Statistics Collector
//!
//! Turns each pass over the Postfix queue into a `SnapshotState`: message
//! size and age distributions per queue, plus whether the pass succeeded
//! and how long it took.

mod queue;
mod state;

pub use queue::{
    QueueCollector, AGE_SECONDS, COLLECTOR_DURATION, COLLECTOR_SUCCESS, JOB_NAME, SIZE_BYTES,
};
pub use state::{Distribution, SnapshotState};
