//! Core types for periodic scheduling.
//!
//! This module contains the building blocks the scheduler is made of:
//! task identifiers, registered tasks, clocks and duration parsing.

pub mod clock;
pub mod duration;
pub mod task;
pub mod types;
