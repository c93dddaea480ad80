//! Refresh scheduler
//!
//! Drives refresh cycles from three triggers: process start, a periodic
//! wall-clock tick and manual requests. At most one cycle runs at a time; a
//! trigger that arrives while a cycle is running is dropped, not queued.
//!
//! # Example
//!
//! ```ignore
//! let scheduler = RefreshScheduler::new(pipeline);
//! let shutdown = CancellationToken::new();
//! tokio::spawn(scheduler.clone().run(shutdown.clone()));
//!
//! // Fire-and-forget manual refresh
//! scheduler.trigger(TriggerSource::Manual);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use super::clock::until_next_tick;
use super::pipeline::{CycleReport, RefreshPipeline};
use crate::error::CycleError;

/// Default refresh period (hourly).
pub const DEFAULT_PERIOD_SECS: u64 = 3600;

/// What asked for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Startup,
    Periodic,
    Manual,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Startup => "startup",
            Self::Periodic => "periodic",
            Self::Manual => "manual",
        })
    }
}

/// Result of a trigger under single-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOutcome {
    /// A new cycle was started
    Started,
    /// A cycle was already running; this trigger was discarded
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    #[default]
    Idle,
    Running,
}

/// Observable scheduler state. Never terminal: failures only set
/// `last_failed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub last_failed: bool,
    pub last_error: Option<String>,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub triggers_dropped: u64,
    pub last_success_at: Option<DateTime<Utc>>,
}

struct Inner {
    pipeline: RefreshPipeline,
    running: AtomicBool,
    status: Mutex<SchedulerStatus>,
    tasks: TaskTracker,
    period: Duration,
    run_on_start: bool,
}

impl Inner {
    fn update_status(&self, f: impl FnOnce(&mut SchedulerStatus)) {
        f(&mut self.status.lock());
    }
}

/// Held for the duration of one cycle; releases the single-flight slot on
/// drop, including on panic.
struct FlightGuard {
    inner: Arc<Inner>,
}

impl FlightGuard {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        inner.update_status(|s| s.state = SchedulerState::Running);
        Some(Self {
            inner: Arc::clone(inner),
        })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inner.update_status(|s| s.state = SchedulerState::Idle);
        self.inner.running.store(false, Ordering::Release);
    }
}

/// Cheap to clone; all clones share one single-flight slot.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    pub fn new(pipeline: RefreshPipeline) -> Self {
        Self::with_settings(pipeline, Duration::from_secs(DEFAULT_PERIOD_SECS), true)
    }

    /// # Arguments
    ///
    /// * `pipeline` - Cycle implementation
    /// * `period` - Periodic tick interval, aligned to multiples of itself
    /// * `run_on_start` - Run one cycle as soon as [`run`](Self::run) starts
    pub fn with_settings(pipeline: RefreshPipeline, period: Duration, run_on_start: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                pipeline,
                running: AtomicBool::new(false),
                status: Mutex::new(SchedulerStatus::default()),
                tasks: TaskTracker::new(),
                period: period.max(Duration::from_secs(1)),
                run_on_start,
            }),
        }
    }

    pub fn pipeline(&self) -> &RefreshPipeline {
        &self.inner.pipeline
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn status(&self) -> SchedulerStatus {
        self.inner.status.lock().clone()
    }

    /// Start a cycle in the background unless one is already running.
    ///
    /// Returns immediately; must be called inside a tokio runtime.
    pub fn trigger(&self, source: TriggerSource) -> TriggerOutcome {
        let Some(guard) = self.acquire(source) else {
            return TriggerOutcome::Dropped;
        };
        let inner = Arc::clone(&self.inner);
        self.inner.tasks.spawn(async move {
            let _guard = guard;
            // Failures are logged and recorded in the status
            let _ = execute(&inner, source).await;
        });
        TriggerOutcome::Started
    }

    /// Run a cycle on the current task unless one is already running.
    ///
    /// # Returns
    ///
    /// `None` if the trigger was dropped, otherwise the cycle result
    pub async fn run_now(&self, source: TriggerSource) -> Option<Result<CycleReport, CycleError>> {
        let _guard = self.acquire(source)?;
        Some(execute(&self.inner, source).await)
    }

    fn acquire(&self, source: TriggerSource) -> Option<FlightGuard> {
        let guard = FlightGuard::acquire(&self.inner);
        if guard.is_none() {
            self.inner.update_status(|s| s.triggers_dropped += 1);
            debug!(%source, "Refresh already running, trigger dropped");
        }
        guard
    }

    /// Run the startup cycle and the periodic loop until `shutdown` fires,
    /// then wait for any in-flight cycle to finish.
    pub async fn run(self, shutdown: CancellationToken) {
        let clock = Arc::clone(self.inner.pipeline.clock());
        info!(period_secs = self.inner.period.as_secs(), "Refresh scheduler starting");

        if self.inner.run_on_start {
            self.trigger(TriggerSource::Startup);
        }

        loop {
            // Recomputed every iteration so sleep overshoot never accumulates
            let now = clock.now();
            let wait = until_next_tick(now, self.inner.period);
            debug!(wait_secs = wait.as_secs(), "Next refresh tick scheduled");

            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    info!("Refresh scheduler shutting down");
                    break;
                }

                () = tokio::time::sleep(wait) => {
                    self.trigger(TriggerSource::Periodic);
                }
            }
        }

        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }
}

/// Run one cycle and record its outcome. The caller holds the flight guard.
async fn execute(inner: &Inner, source: TriggerSource) -> Result<CycleReport, CycleError> {
    info!(%source, "Refresh cycle starting");
    let result = inner.pipeline.run_cycle().await;
    let now = inner.pipeline.clock().now();

    match &result {
        Ok(report) => {
            info!(
                %source,
                generation = report.generation,
                omitted = report.failures.len(),
                "Refresh cycle complete"
            );
            inner.update_status(|s| {
                s.cycles_completed += 1;
                s.last_failed = false;
                s.last_error = None;
                s.last_success_at = Some(now);
            });
        }
        Err(e) => {
            error!(%source, "Refresh cycle failed: {e}");
            let message = e.to_string();
            inner.update_status(|s| {
                s.cycles_failed += 1;
                s.last_failed = true;
                s.last_error = Some(message);
            });
        }
    }

    result
}
