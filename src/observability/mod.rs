//! Observability
//!
//! - `recorder`: the boundary metrics readers plug into
//! - `statsd`: the production recorder, a DogStatsD push client
//! - `mask`: address redaction for anything that reaches a log line
//! - `tracing_setup`: subscriber construction from `LogConfig`
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | config `log.level` | `EnvFilter` directive, overrides the configured level |

pub mod mask;
pub mod recorder;
pub mod statsd;
pub mod tracing_setup;

pub use mask::mask_addresses;
pub use recorder::{
    MetricDesc, MetricType, MetricsRecorder, NoopMetrics, RecordedMetric, SharedMetrics,
    SimulatedMetrics,
};
pub use statsd::StatsdMetrics;
pub use tracing_setup::{dispatch, init as init_tracing};
