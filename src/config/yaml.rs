//! YAML configuration parsing.
//!
//! Parses the scheduler resolution and task definitions from YAML.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::core::duration::parse_duration;

use super::error::ConfigError;

/// Scheduler configuration.
///
/// ```yaml
/// resolution: 1ms
/// thread_name: metronome
/// tasks:
///   - name: seconds
///     period: 1s
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Polling resolution, e.g. `"10ms"`.
    pub resolution: String,
    /// Name of the background loop thread.
    pub thread_name: Option<String>,
    /// Task definitions.
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl SchedulerConfig {
    /// Get the parsed polling resolution.
    pub fn resolution(&self) -> Result<Duration, ConfigError> {
        parse_field("resolution", &self.resolution)
    }
}

/// Task configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task name (unique within the file).
    pub name: String,
    /// Repetition period, e.g. `"100ms"`.
    pub period: String,
}

impl TaskConfig {
    /// Get the parsed repetition period.
    pub fn period(&self) -> Result<Duration, ConfigError> {
        parse_field(&format!("tasks.{}.period", self.name), &self.period)
    }
}

fn parse_field(field: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|source| ConfigError::InvalidDuration {
        field: field.to_string(),
        source,
    })
}

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load a scheduler configuration from a file.
    pub fn load_config(path: impl AsRef<Path>) -> Result<SchedulerConfig, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse_config(&content)
    }

    /// Parse a scheduler configuration from a YAML string.
    pub fn parse_config(yaml: &str) -> Result<SchedulerConfig, ConfigError> {
        let config: SchedulerConfig = serde_yaml::from_str(yaml)?;
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Validate a scheduler configuration.
    fn validate_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
        config.resolution()?;

        if let Some(name) = &config.thread_name
            && name.trim().is_empty()
        {
            return Err(ConfigError::InvalidConfig(
                "thread_name must not be empty".into(),
            ));
        }

        let mut names = HashSet::new();
        for task in &config.tasks {
            if task.name.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "task name must not be empty".into(),
                ));
            }
            if !names.insert(task.name.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate task name: {}",
                    task.name
                )));
            }
            task.period()?;
        }

        Ok(())
    }
}
