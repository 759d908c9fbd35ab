//! Periodic scheduler engine.
//!
//! This module provides the background loop that fires registered tasks at
//! their periods, plus the lifecycle and error types around it.

mod engine;
mod types;

pub use engine::{DEFAULT_THREAD_NAME, PeriodicScheduler, SchedulerBuilder};
pub use types::{SchedulerError, SchedulerState};
