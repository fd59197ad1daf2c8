//! Clock and deferred-task scheduling
//!
//! The engine never reads the wall clock or spawns detached timers directly.
//! Everything time-dependent goes through [`Clock`] and [`Scheduler`], so tests
//! can swap in [`ManualClock`] and [`ManualScheduler`] and step time by hand.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Work deferred through a [`Scheduler`]
pub type DeferredTask = BoxFuture<'static, ()>;

/// Handle to a scheduled task; cancelling prevents it from running
#[derive(Debug, Clone)]
pub struct ScheduledHandle {
    token: CancellationToken,
}

impl ScheduledHandle {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Cancel the task if it has not run yet
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the task was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Runs work after a delay
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed
    fn after(&self, delay: Duration, task: DeferredTask) -> ScheduledHandle;
}

/// Scheduler backed by the tokio timer
///
/// Every task is tied to a child of the shutdown token, so cancelling the
/// parent drops all pending work.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    shutdown: CancellationToken,
}

impl TokioScheduler {
    /// Create a scheduler whose tasks stop when `shutdown` is cancelled
    #[must_use]
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }
}

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: DeferredTask) -> ScheduledHandle {
        let token = self.shutdown.child_token();
        let guard = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => task.await,
                _ = guard.cancelled() => debug!("Scheduled task cancelled"),
            }
        });
        ScheduledHandle::new(token)
    }
}

struct PendingTask {
    due: DateTime<Utc>,
    token: CancellationToken,
    task: DeferredTask,
}

/// Scheduler driven by a [`ManualClock`]
///
/// Tasks only run when [`ManualScheduler::run_due`] is called and their due
/// time has been reached on the clock.
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    pending: Mutex<Vec<PendingTask>>,
}

impl ManualScheduler {
    /// Create a scheduler reading due times from `clock`
    #[must_use]
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Number of tasks still waiting (cancelled ones excluded)
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|p| !p.token.is_cancelled())
            .count()
    }

    /// Run every task whose due time has passed, in due order.
    ///
    /// Returns the number of tasks executed.
    pub async fn run_due(&self) -> usize {
        let now = self.clock.now();
        let mut due: Vec<PendingTask> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            let (ready, waiting): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|p| p.due <= now);
            *pending = waiting;
            ready
        };
        due.sort_by_key(|p| p.due);

        let mut executed = 0;
        for pending in due {
            if pending.token.is_cancelled() {
                continue;
            }
            pending.task.await;
            executed += 1;
        }
        executed
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: DeferredTask) -> ScheduledHandle {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        let due = self.clock.now().checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let token = CancellationToken::new();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PendingTask {
                due,
                token: token.clone(),
                task,
            });
        ScheduledHandle::new(token)
    }
}

#[cfg(test)]
mod tests;
