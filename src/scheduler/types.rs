//! Scheduler type definitions.
//!
//! This module contains the error type and the lifecycle state enum.

use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The polling resolution was zero.
    #[error("resolution must be positive")]
    InvalidResolution,

    /// A task period was zero.
    #[error("task period must be positive")]
    InvalidPeriod,

    /// The background loop thread could not be started.
    #[error("failed to start scheduler thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// State of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed; the loop has not been started yet.
    Idle,
    /// The loop is ticking.
    Running,
    /// The loop was told to stop and will not start again until resumed.
    Stopped,
}

impl SchedulerState {
    const fn as_u8(self) -> u8 {
        match self {
            SchedulerState::Idle => 0,
            SchedulerState::Running => 1,
            SchedulerState::Stopped => 2,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            0 => SchedulerState::Idle,
            1 => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }
}

/// [`SchedulerState`] stored in a single atomic so `stop` never blocks.
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new(state: SchedulerState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub(crate) fn load(&self) -> SchedulerState {
        SchedulerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: SchedulerState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Replace the state, returning the previous one.
    pub(crate) fn swap(&self, state: SchedulerState) -> SchedulerState {
        SchedulerState::from_u8(self.0.swap(state.as_u8(), Ordering::SeqCst))
    }

    /// Move from `current` to `new`; returns whether the transition happened.
    pub(crate) fn transition(&self, current: SchedulerState, new: SchedulerState) -> bool {
        self.0
            .compare_exchange(
                current.as_u8(),
                new.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}
