//! Testing utilities for users of the metronome library.
//!
//! This module provides helpers for testing code that schedules periodic work:
//!
//! - [`FireCounter`]: A shareable counter whose callback counts firings
//! - [`RecordingHandler`]: An event handler that records every event
//! - [`wait_until`]: Polls a condition until it holds or a timeout expires
//!
//! Pair these with [`ManualClock`](crate::ManualClock) and
//! [`PeriodicScheduler::run_pending`](crate::PeriodicScheduler::run_pending)
//! for fully deterministic tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::events::{EventHandler, SchedulerEvent};

/// Interval between condition checks in [`wait_until`].
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A counter incremented by the callbacks it hands out.
///
/// # Example
///
/// ```
/// use metronome::testing::FireCounter;
///
/// let counter = FireCounter::new();
/// let mut callback = counter.callback();
/// callback();
/// callback();
/// assert_eq!(counter.count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FireCounter {
    count: Arc<AtomicU64>,
}

impl FireCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that increments this counter each time it runs.
    pub fn callback(&self) -> impl FnMut() + Send + 'static {
        let count = Arc::clone(&self.count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

/// Event handler that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<SchedulerEvent>>,
}

impl RecordingHandler {
    /// Create a handler ready to be registered on an event bus.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All events received so far.
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events matching `pred`.
    pub fn count_matching(&self, pred: impl Fn(&SchedulerEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| pred(e))
            .count()
    }
}

impl EventHandler for RecordingHandler {
    fn handle(&self, event: &SchedulerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Poll `condition` until it returns true or `timeout` elapses.
///
/// Returns whether the condition was met. More reliable than fixed sleeps
/// when waiting on the background loop.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
