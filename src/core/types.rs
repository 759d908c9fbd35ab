//! Core identifier types for the scheduler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a registered periodic task.
///
/// Identifiers are handed out by a single scheduler in strictly increasing
/// order and are never reused, even after the task is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Create a TaskId from a raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The identifier that follows this one.
    pub(crate) const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
