//! Lifecycle events and event handling.
//!
//! The scheduler reports task registration, firings, callback panics and
//! loop lifecycle changes through an [`EventBus`]. Handlers are synchronous
//! and may be invoked from the loop thread while the task collection is
//! locked, so they must return quickly and must not call back into the
//! scheduler.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::core::types::TaskId;

/// Lifecycle events emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A task was registered.
    TaskAdded {
        task_id: TaskId,
        period: Duration,
        timestamp: Instant,
    },

    /// A task was removed.
    TaskRemoved { task_id: TaskId, timestamp: Instant },

    /// A task's callback ran to completion.
    TaskFired {
        task_id: TaskId,
        /// How long the callback took.
        duration: Duration,
        /// How far past its due instant the task fired.
        lateness: Duration,
        timestamp: Instant,
    },

    /// A task's callback panicked. The task stays scheduled.
    TaskPanicked {
        task_id: TaskId,
        message: String,
        timestamp: Instant,
    },

    /// The background loop started.
    LoopStarted { timestamp: Instant },

    /// The background loop exited.
    LoopStopped { timestamp: Instant },

    /// The scheduler was resumed and every task re-armed.
    Resumed { task_count: usize, timestamp: Instant },
}

impl SchedulerEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            SchedulerEvent::TaskAdded { timestamp, .. } => *timestamp,
            SchedulerEvent::TaskRemoved { timestamp, .. } => *timestamp,
            SchedulerEvent::TaskFired { timestamp, .. } => *timestamp,
            SchedulerEvent::TaskPanicked { timestamp, .. } => *timestamp,
            SchedulerEvent::LoopStarted { timestamp } => *timestamp,
            SchedulerEvent::LoopStopped { timestamp } => *timestamp,
            SchedulerEvent::Resumed { timestamp, .. } => *timestamp,
        }
    }

    /// The task this event concerns, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            SchedulerEvent::TaskAdded { task_id, .. }
            | SchedulerEvent::TaskRemoved { task_id, .. }
            | SchedulerEvent::TaskFired { task_id, .. }
            | SchedulerEvent::TaskPanicked { task_id, .. } => Some(*task_id),
            _ => None,
        }
    }

    /// Create a TaskAdded event.
    pub fn task_added(task_id: TaskId, period: Duration) -> Self {
        SchedulerEvent::TaskAdded {
            task_id,
            period,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskRemoved event.
    pub fn task_removed(task_id: TaskId) -> Self {
        SchedulerEvent::TaskRemoved {
            task_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskFired event.
    pub fn task_fired(task_id: TaskId, duration: Duration, lateness: Duration) -> Self {
        SchedulerEvent::TaskFired {
            task_id,
            duration,
            lateness,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskPanicked event.
    pub fn task_panicked(task_id: TaskId, message: String) -> Self {
        SchedulerEvent::TaskPanicked {
            task_id,
            message,
            timestamp: Instant::now(),
        }
    }

    /// Create a LoopStarted event.
    pub fn loop_started() -> Self {
        SchedulerEvent::LoopStarted {
            timestamp: Instant::now(),
        }
    }

    /// Create a LoopStopped event.
    pub fn loop_stopped() -> Self {
        SchedulerEvent::LoopStopped {
            timestamp: Instant::now(),
        }
    }

    /// Create a Resumed event.
    pub fn resumed(task_count: usize) -> Self {
        SchedulerEvent::Resumed {
            task_count,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving scheduler events.
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    fn handle(&self, event: &SchedulerEvent);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub fn emit(&self, event: SchedulerEvent) {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        for handler in handlers.iter() {
            handler.handle(&event);
        }
    }

    /// Emit an event built lazily, skipping construction when nobody listens.
    pub(crate) fn emit_with(&self, build: impl FnOnce() -> SchedulerEvent) {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        if handlers.is_empty() {
            return;
        }
        let event = build();
        for handler in handlers.iter() {
            handler.handle(&event);
        }
    }

    /// Get the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
