//! Registered periodic tasks.
//!
//! A [`ScheduledTask`] pairs a callback with its period and the clock reading
//! at which its current period began. The scheduler owns every task
//! exclusively; callers only hold the [`TaskId`].

use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use super::types::TaskId;

/// Callback invoked each time a task fires.
pub type TaskCallback = Box<dyn FnMut() + Send + 'static>;

/// One registered (callback, period) pair.
pub struct ScheduledTask {
    id: TaskId,
    callback: TaskCallback,
    period: Duration,
    /// Clock reading at which the current period began.
    period_start: Duration,
    fire_count: u64,
    panic_count: u64,
}

impl ScheduledTask {
    /// Create a task whose first period starts at `now`.
    pub fn new(id: TaskId, callback: TaskCallback, period: Duration, now: Duration) -> Self {
        Self {
            id,
            callback,
            period,
            period_start: now,
            fire_count: 0,
            panic_count: 0,
        }
    }

    /// Get the task identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Clock reading at which the task next becomes due.
    ///
    /// Returns `None` when the due instant is not representable, in which case
    /// the task never fires.
    pub fn due_at(&self) -> Option<Duration> {
        self.period_start.checked_add(self.period)
    }

    /// How far past its due instant the task is at `now`, or `None` if it is
    /// not due yet.
    pub fn lateness(&self, now: Duration) -> Option<Duration> {
        self.due_at()
            .filter(|due| *due <= now)
            .map(|due| now - due)
    }

    /// Invoke the callback, catching any panic.
    ///
    /// On panic the payload is rendered to a message and returned as the error;
    /// the task's own counters are updated either way.
    pub fn fire(&mut self) -> Result<(), String> {
        let callback = &mut self.callback;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback()));
        self.fire_count += 1;

        outcome.map_err(|payload| {
            self.panic_count += 1;
            panic_message(payload.as_ref())
        })
    }

    /// Advance the period by exactly one step.
    ///
    /// The new period starts where the previous one was due, not at the time
    /// the callback actually ran, so late firings do not shift the phase.
    pub fn advance(&mut self) {
        if let Some(due) = self.due_at() {
            self.period_start = due;
        }
    }

    /// Start a fresh period at `now`, discarding any backlog.
    pub fn rearm(&mut self, now: Duration) {
        self.period_start = now;
    }

    /// Capture the task's current bookkeeping.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            period: self.period,
            next_due: self.due_at(),
            fire_count: self.fire_count,
            panic_count: self.panic_count,
        }
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("period", &self.period)
            .field("period_start", &self.period_start)
            .field("fire_count", &self.fire_count)
            .field("panic_count", &self.panic_count)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a registered task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    /// Task identifier.
    pub id: TaskId,
    /// Repetition period.
    pub period: Duration,
    /// Clock reading at which the task next becomes due.
    pub next_due: Option<Duration>,
    /// Number of times the callback has been invoked.
    pub fire_count: u64,
    /// Number of invocations that panicked.
    pub panic_count: u64,
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
