//! Background Job Scheduler
//!
//! Every registered job gets its own interval ticker and its own run lock.
//! A tick spawns one run of the job, which first takes the lock, so a run
//! that comes due while the previous one is still going waits for it
//! instead of being dropped or overlapping.
//!
//! On shutdown the run holding the lock is allowed to finish; runs still
//! waiting for it are dropped without calling the job.
//!
//! The set of jobs is fixed when the scheduler starts. Logging from the
//! scheduler and the runs it spawns goes to an injected `Dispatch` when
//! one is given, otherwise to the global subscriber.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::instrument::WithSubscriber;
use tracing::{debug, warn, Dispatch};

/// A unit of periodic work
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Execute one run. The scheduler never calls this concurrently for
    /// the same registration.
    fn run(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("job `{0}` is already registered")]
    Duplicate(&'static str),

    #[error("job `{0}` has a zero interval")]
    ZeroInterval(&'static str),
}

struct Registration {
    job: Arc<dyn Job>,
    interval: Duration,
    lock: Arc<Mutex<()>>,
}

/// Jobs known at startup
#[derive(Default)]
pub struct JobRegistry {
    jobs: Vec<Registration>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Arc<dyn Job>, interval: Duration) -> Result<(), RegistryError> {
        let name = job.name();
        if interval.is_zero() {
            return Err(RegistryError::ZeroInterval(name));
        }
        if self.jobs.iter().any(|r| r.job.name() == name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.jobs.push(Registration {
            job,
            interval,
            lock: Arc::new(Mutex::new(())),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|r| r.job.name()).collect()
    }
}

pub struct Scheduler {
    registry: JobRegistry,
    dispatch: Option<Dispatch>,
    run_immediately: bool,
}

impl Scheduler {
    pub fn new(registry: JobRegistry) -> Self {
        Scheduler {
            registry,
            dispatch: None,
            run_immediately: false,
        }
    }

    /// Log through `dispatch` instead of the global subscriber
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Fire the first tick at start instead of one interval later
    pub fn with_initial_run(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    /// Spawn one ticker per job. Must be called inside a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tickers = self
            .registry
            .jobs
            .into_iter()
            .map(|registration| {
                let ticker = run_ticker(
                    registration,
                    self.run_immediately,
                    self.dispatch.clone(),
                    shutdown_rx.clone(),
                );
                spawn_with(&self.dispatch, ticker)
            })
            .collect();

        SchedulerHandle {
            shutdown: shutdown_tx,
            tickers,
        }
    }
}

/// Running scheduler
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tickers: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop ticking, drop queued runs and wait for the running ones
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for ticker in self.tickers {
            if let Err(e) = ticker.await {
                warn!(error = %e, "Scheduler ticker ended abnormally");
            }
        }
    }
}

fn spawn_with<F>(dispatch: &Option<Dispatch>, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match dispatch {
        Some(d) => tokio::spawn(future.with_subscriber(d.clone())),
        None => tokio::spawn(future),
    }
}

async fn run_ticker(
    registration: Registration,
    run_immediately: bool,
    dispatch: Option<Dispatch>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Registration {
        job,
        interval: period,
        lock,
    } = registration;
    let name = job.name();

    let mut ticker = if run_immediately {
        interval(period)
    } else {
        interval_at(Instant::now() + period, period)
    };
    // Late ticks are delivered, never skipped
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    debug!(job = name, interval_secs = period.as_secs_f64(), "Starting job ticker");

    let mut runs = JoinSet::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let job = job.clone();
                let lock = lock.clone();
                let mut stopping = shutdown.clone();
                let run = async move {
                    let _running = tokio::select! {
                        biased;
                        _ = stopping.wait_for(|stop| *stop) => return,
                        guard = lock.lock() => guard,
                    };
                    if *stopping.borrow() {
                        return;
                    }
                    job.run().await
                };
                match &dispatch {
                    Some(d) => runs.spawn(run.with_subscriber(d.clone())),
                    None => runs.spawn(run),
                };
                debug!(job = name, pending = runs.len(), next_in_secs = period.as_secs_f64(), "Tick dispatched");
            }
            Some(finished) = runs.join_next(), if !runs.is_empty() => {
                if let Err(e) = finished {
                    warn!(job = name, error = %e, "Job run ended abnormally");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!(job = name, pending = runs.len(), "Stopping job ticker");
    while let Some(finished) = runs.join_next().await {
        if let Err(e) = finished {
            warn!(job = name, error = %e, "Job run ended abnormally");
        }
    }
}
