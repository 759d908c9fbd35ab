//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Registering and removing tasks from any thread
//! - Driving every task from one background loop thread
//! - Keeping each task's cadence aligned to its period (drift correction)
//! - Stop and resume of the loop
//! - Isolating callback panics
//! - Event emission
//!
//! # Locking
//!
//! One mutex guards the task collection and is held for a whole tick pass,
//! so callbacks run with it held. A callback that blocks stalls `add_task`,
//! `remove_task` and `resume` on other threads until it returns. Calling
//! `add_task`, `remove_task`, `resume` or `run_pending` from inside a
//! callback (or from an event handler invoked during a pass) deadlocks.
//! `stop` is safe to call from anywhere.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::clock::{Clock, SystemClock};
use crate::core::task::{ScheduledTask, TaskSnapshot};
use crate::core::types::TaskId;
use crate::events::{EventBus, SchedulerEvent};

use super::types::{AtomicState, SchedulerError, SchedulerState};

/// Name given to the background loop thread unless configured otherwise.
pub const DEFAULT_THREAD_NAME: &str = "metronome-tick";

/// Registered tasks and the id counter, guarded together.
struct TaskTable {
    tasks: BTreeMap<TaskId, ScheduledTask>,
    next_id: TaskId,
}

impl TaskTable {
    fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: TaskId::new(0),
        }
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }
}

/// State shared between the scheduler handle and its loop thread.
struct Shared {
    tasks: Mutex<TaskTable>,
    state: AtomicState,
    /// Paired with `wake` so `stop` can interrupt the loop's sleep.
    parker: Mutex<()>,
    wake: Condvar,
    resolution: Duration,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
}

impl Shared {
    fn lock_tasks(&self) -> MutexGuard<'_, TaskTable> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.state.load() == SchedulerState::Running
    }

    /// Wake the loop if it is sleeping so it re-checks the state.
    fn wake_loop(&self) {
        let _guard = self.parker.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake.notify_all();
    }

    /// Sleep up to `timeout`, returning early once the loop should exit.
    fn park(&self, timeout: Duration) {
        let guard = self.parker.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = self
            .wake
            .wait_timeout_while(guard, timeout, |_| self.is_running());
    }

    /// Fire every due task once.
    ///
    /// Each task fires at most once per pass: a task that fell several periods
    /// behind catches up one firing per pass. After firing, the task's period
    /// advances by exactly one period from where it was due, never to "now".
    ///
    /// With `halt_on_stop`, the pass skips its remaining tasks once the
    /// scheduler leaves `Running`, so nothing fires after a drop that happened
    /// inside a callback.
    fn tick_pass(&self, halt_on_stop: bool) -> usize {
        let mut table = self.lock_tasks();
        let mut fired = 0;

        for task in table.tasks.values_mut() {
            if halt_on_stop && !self.is_running() {
                tracing::debug!("Scheduler stopped mid-pass, skipping remaining tasks");
                break;
            }

            let now = self.clock.now();
            let Some(lateness) = task.lateness(now) else {
                continue;
            };

            let outcome = task.fire();
            let duration = self.clock.now().saturating_sub(now);
            task.advance();
            fired += 1;

            let task_id = task.id();
            match outcome {
                Ok(()) => {
                    tracing::trace!(task_id = %task_id, lateness = ?lateness, "Task fired");
                    self.event_bus
                        .emit_with(|| SchedulerEvent::task_fired(task_id, duration, lateness));
                }
                Err(message) => {
                    tracing::error!(
                        task_id = %task_id,
                        error = %message,
                        "Task callback panicked, task stays scheduled"
                    );
                    self.event_bus
                        .emit(SchedulerEvent::task_panicked(task_id, message));
                }
            }
        }

        fired
    }
}

/// Body of the background thread.
fn run_loop(shared: Arc<Shared>) {
    tracing::info!(resolution = ?shared.resolution, "Scheduler loop started");
    shared.event_bus.emit(SchedulerEvent::loop_started());

    while shared.is_running() {
        let started = shared.clock.now();
        shared.tick_pass(true);
        let elapsed = shared.clock.now().saturating_sub(started);

        if elapsed >= shared.resolution {
            tracing::debug!(
                elapsed = ?elapsed,
                resolution = ?shared.resolution,
                "Tick pass overran resolution"
            );
        }

        shared.park(shared.resolution.saturating_sub(elapsed));
    }

    tracing::info!("Scheduler loop stopped");
    shared.event_bus.emit(SchedulerEvent::loop_stopped());
}

/// Wait for a loop thread to exit. A loop cannot join itself, which happens
/// when the last handle to the scheduler is dropped inside a callback.
fn join_worker(handle: JoinHandle<()>) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        tracing::error!("Scheduler loop thread panicked");
    }
}

/// Builder for [`PeriodicScheduler`].
pub struct SchedulerBuilder {
    resolution: Duration,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
    thread_name: String,
}

impl SchedulerBuilder {
    /// Start building a scheduler that polls every `resolution`.
    pub fn new(resolution: Duration) -> Self {
        Self {
            resolution,
            clock: Arc::new(SystemClock::new()),
            event_bus: Arc::new(EventBus::new()),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Set the clock used for due-time bookkeeping.
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Set the event bus.
    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Set the name of the background loop thread.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Build the scheduler. The loop is not started until the first task is added.
    pub fn build(self) -> Result<PeriodicScheduler, SchedulerError> {
        if self.resolution.is_zero() {
            return Err(SchedulerError::InvalidResolution);
        }

        Ok(PeriodicScheduler {
            shared: Arc::new(Shared {
                tasks: Mutex::new(TaskTable::new()),
                state: AtomicState::new(SchedulerState::Idle),
                parker: Mutex::new(()),
                wake: Condvar::new(),
                resolution: self.resolution,
                clock: self.clock,
                event_bus: self.event_bus,
            }),
            worker: Mutex::new(None),
            thread_name: self.thread_name,
        })
    }
}

/// Runs callbacks at fixed periods from a single background thread.
///
/// The loop wakes about every `resolution`, fires each task whose period
/// has elapsed and sleeps again. A task never fires more often than once per
/// loop iteration, so periods shorter than the resolution are rounded up to
/// it.
///
/// Dropping the scheduler stops the loop and waits for it to exit; no
/// callback runs after the drop returns.
///
/// # Example
///
/// ```
/// use metronome::{ManualClock, PeriodicScheduler};
/// use metronome::testing::FireCounter;
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let scheduler = PeriodicScheduler::builder(Duration::from_millis(10))
///     .clock(clock.clone())
///     .build()
///     .unwrap();
/// // Drive passes by hand instead of from the loop thread.
/// scheduler.stop();
///
/// let counter = FireCounter::new();
/// scheduler
///     .add_task(counter.callback(), Duration::from_millis(100))
///     .unwrap();
///
/// clock.advance(Duration::from_millis(100));
/// assert_eq!(scheduler.run_pending(), 1);
/// assert_eq!(counter.count(), 1);
/// ```
pub struct PeriodicScheduler {
    shared: Arc<Shared>,
    /// Handle of the current loop thread. Also serialises loop start and join.
    worker: Mutex<Option<JoinHandle<()>>>,
    thread_name: String,
}

impl PeriodicScheduler {
    /// Create a scheduler using the system clock.
    pub fn new(resolution: Duration) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(resolution).build()
    }

    /// Create a scheduler using the given clock.
    pub fn with_clock(resolution: Duration, clock: impl Clock) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(resolution).clock(clock).build()
    }

    /// Start building a scheduler with custom settings.
    pub fn builder(resolution: Duration) -> SchedulerBuilder {
        SchedulerBuilder::new(resolution)
    }

    /// Register `callback` to run every `period`.
    ///
    /// The first firing happens one period after registration. Adding the
    /// first task to an idle scheduler starts the loop; while stopped, tasks
    /// are registered but do not run until [`resume`](Self::resume).
    pub fn add_task<F>(&self, callback: F, period: Duration) -> Result<TaskId, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod);
        }

        if self.shared.state.load() == SchedulerState::Idle {
            self.start_if_idle()?;
        }

        let task_id = {
            let mut table = self.shared.lock_tasks();
            let task_id = table.allocate_id();
            let now = self.shared.clock.now();
            table.tasks.insert(
                task_id,
                ScheduledTask::new(task_id, Box::new(callback), period, now),
            );
            task_id
        };

        tracing::debug!(task_id = %task_id, period = ?period, "Task added");
        self.shared
            .event_bus
            .emit_with(|| SchedulerEvent::task_added(task_id, period));

        Ok(task_id)
    }

    /// Remove a task. Returns `false` if no task has that id.
    ///
    /// A callback that is currently running finishes first; removal takes
    /// effect between tick passes.
    pub fn remove_task(&self, task_id: TaskId) -> bool {
        // Drop the task outside the lock; its callback may own arbitrary state.
        let removed = {
            let mut table = self.shared.lock_tasks();
            table.tasks.remove(&task_id)
        };

        match removed {
            Some(_) => {
                tracing::debug!(task_id = %task_id, "Task removed");
                self.shared
                    .event_bus
                    .emit_with(|| SchedulerEvent::task_removed(task_id));
                true
            }
            None => {
                tracing::trace!(task_id = %task_id, "Ignoring removal of unknown task");
                false
            }
        }
    }

    /// Stop the loop after its current iteration.
    ///
    /// Does not wait for the loop to exit and does not clear the task list.
    /// Calling it again has no further effect. Stopping an idle scheduler
    /// keeps the loop from being started by `add_task`. A callback that is
    /// running finishes, but tasks later in the same pass are skipped.
    pub fn stop(&self) {
        let previous = self.shared.state.swap(SchedulerState::Stopped);
        if previous == SchedulerState::Running {
            tracing::info!("Scheduler stop requested");
        }
        self.shared.wake_loop();
    }

    /// Re-arm every task and restart the loop.
    ///
    /// Each task's next firing is one full period after the resume, so time
    /// spent stopped is not caught up. Any loop still running is stopped and
    /// joined first, so calling this while running restarts the loop. Must
    /// not be called from inside a callback.
    pub fn resume(&self) -> Result<(), SchedulerError> {
        let mut worker = self.lock_worker();

        self.shared.state.store(SchedulerState::Stopped);
        self.shared.wake_loop();
        if let Some(handle) = worker.take() {
            join_worker(handle);
        }

        let task_count = {
            let mut table = self.shared.lock_tasks();
            let now = self.shared.clock.now();
            for task in table.tasks.values_mut() {
                task.rearm(now);
            }
            table.tasks.len()
        };

        self.shared.state.store(SchedulerState::Running);
        match self.spawn_loop() {
            Ok(handle) => *worker = Some(handle),
            Err(e) => {
                self.shared.state.store(SchedulerState::Stopped);
                return Err(e);
            }
        }
        drop(worker);

        tracing::info!(task_count, "Scheduler resumed");
        self.shared.event_bus.emit(SchedulerEvent::resumed(task_count));
        Ok(())
    }

    /// Run one tick pass on the calling thread and return how many tasks fired.
    ///
    /// This is the pass the loop runs on every wake-up. It works in any
    /// state, which makes it the way to drive a stopped scheduler with a
    /// [`ManualClock`](crate::ManualClock) in tests.
    pub fn run_pending(&self) -> usize {
        self.shared.tick_pass(false)
    }

    /// Get the current state.
    pub fn state(&self) -> SchedulerState {
        self.shared.state.load()
    }

    /// Check if the loop is running.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Get the polling resolution.
    pub fn resolution(&self) -> Duration {
        self.shared.resolution
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.shared.lock_tasks().tasks.len()
    }

    /// Check if no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.shared.lock_tasks().tasks.is_empty()
    }

    /// Check if a task is registered.
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.shared.lock_tasks().tasks.contains_key(&task_id)
    }

    /// Ids of all registered tasks, in registration order.
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.shared.lock_tasks().tasks.keys().copied().collect()
    }

    /// Bookkeeping of all registered tasks, in registration order.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.shared
            .lock_tasks()
            .tasks
            .values()
            .map(ScheduledTask::snapshot)
            .collect()
    }

    /// Get the event bus, for registering handlers.
    pub fn event_bus(&self) -> &EventBus {
        &self.shared.event_bus
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_if_idle(&self) -> Result<(), SchedulerError> {
        let mut worker = self.lock_worker();
        if !self
            .shared
            .state
            .transition(SchedulerState::Idle, SchedulerState::Running)
        {
            return Ok(());
        }

        match self.spawn_loop() {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared
                    .state
                    .transition(SchedulerState::Running, SchedulerState::Idle);
                Err(e)
            }
        }
    }

    fn spawn_loop(&self) -> Result<JoinHandle<()>, SchedulerError> {
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run_loop(shared))
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to start scheduler thread");
                SchedulerError::Spawn(e)
            })
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        self.stop();
        let handle = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            join_worker(handle);
        }
    }
}

impl fmt::Debug for PeriodicScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicScheduler")
            .field("resolution", &self.shared.resolution)
            .field("state", &self.state())
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}
