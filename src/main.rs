#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::Parser;
use postfix_queue_exporter::config::{ExporterConfig, LogFormat};
use postfix_queue_exporter::observability::{self, StatsdMetrics};
use postfix_queue_exporter::postqueue::{AnyTransport, PostQueue};
use postfix_queue_exporter::{JobRegistry, QueueCollector, Scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Postfix queue exporter
#[derive(Parser, Debug)]
#[command(name = "postfix-queue-exporter", version)]
struct Args {
    /// TOML configuration file; flags override its values
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// showq endpoint (path, unix:PATH or tcp:HOST:PORT)
    #[arg(long = "postfix.showq-path", value_name = "ADDRESS")]
    showq_path: Option<String>,

    /// Seconds between queue snapshots
    #[arg(long = "postfix.interval", value_name = "SECONDS")]
    interval: Option<u64>,

    /// Workers per snapshot (default: one per CPU)
    #[arg(long = "postfix.workers", value_name = "N")]
    workers: Option<usize>,

    /// Log filter directive, e.g. `info` or `postfix_queue_exporter=debug`
    #[arg(long = "log.level", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log output format
    #[arg(long = "log.format", value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// DogStatsD agent receiving every snapshot
    #[arg(long = "statsd.addr", value_name = "HOST:PORT")]
    statsd_addr: Option<String>,

    /// Prefix for metric names sent to DogStatsD
    #[arg(long = "statsd.prefix", value_name = "PREFIX")]
    statsd_prefix: Option<String>,

    /// Collect without pushing to DogStatsD
    #[arg(long = "no-statsd")]
    no_statsd: bool,
}

impl Args {
    fn into_config(self) -> Result<ExporterConfig, BoxError> {
        let mut config = match &self.config {
            Some(path) => ExporterConfig::from_file(path)?,
            None => ExporterConfig::default(),
        };
        if let Some(address) = self.showq_path {
            config.showq_address = address;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }
        if let Some(addr) = self.statsd_addr {
            config.statsd.addr = addr;
        }
        if let Some(prefix) = self.statsd_prefix {
            config.statsd.prefix = prefix;
        }
        if self.no_statsd {
            config.statsd.enabled = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Args::parse().into_config()?;
    observability::init_tracing(&config.log)?;

    let address = config.showq_address()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        showq = %address,
        interval_secs = config.interval_secs,
        statsd = config.statsd.enabled,
        "Starting postfix queue exporter"
    );

    let mut postqueue = PostQueue::new(AnyTransport::from(&address));
    if config.workers > 0 {
        postqueue = postqueue.with_workers(config.workers);
    }
    let mut collector = QueueCollector::new(postqueue);
    if config.statsd.enabled {
        collector = collector.with_recorder(Arc::new(StatsdMetrics::new(&config.statsd)));
    } else {
        info!("DogStatsD disabled, snapshots are only logged");
    }
    let collector = Arc::new(collector);

    let mut registry = JobRegistry::new();
    registry.register(collector.clone(), config.interval())?;
    let scheduler = Scheduler::new(registry).with_initial_run(true).start();

    signal::ctrl_c().await?;
    info!("Shutting down, waiting for in-flight collection");
    scheduler.shutdown().await;

    let last = collector.snapshot();
    info!(
        success = last.success,
        entries = last.entries,
        duration_secs = last.duration.as_secs_f64(),
        "Last snapshot"
    );

    Ok(())
}
