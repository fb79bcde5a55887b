pub mod collector;
pub mod config;
pub mod observability;
pub mod postqueue;
pub mod scheduler;
pub mod showq;

pub use collector::{QueueCollector, SnapshotState};
pub use config::ExporterConfig;
pub use postqueue::{PostQueue, QueueError, Transport};
pub use scheduler::{Job, JobRegistry, Scheduler, SchedulerHandle};
pub use showq::{DecodeError, QueueEntry, Recipient, ShowqReader};
