//! Configuration error types.
//!
//! This module defines error types for configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::duration::DurationError;
use crate::scheduler::SchedulerError;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a specific file with context.
    #[error("failed to read file '{path}': {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A duration field could not be parsed.
    #[error("invalid duration for '{field}': {source}")]
    InvalidDuration {
        field: String,
        #[source]
        source: DurationError,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured values were rejected by the scheduler.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}
