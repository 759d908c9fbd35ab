//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for the scheduler's
//! resolution, loop thread name and task periods.

mod builder;
mod error;
mod yaml;

pub use builder::{build_scheduler, build_scheduler_with_events};
pub use error::ConfigError;
pub use yaml::{SchedulerConfig, TaskConfig, YamlLoader};
