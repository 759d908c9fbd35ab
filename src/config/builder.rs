//! Scheduler construction from configuration.

use crate::events::EventBus;
use crate::scheduler::PeriodicScheduler;

use super::error::ConfigError;
use super::yaml::SchedulerConfig;

/// Build a scheduler with the configured resolution and thread name.
///
/// Tasks are not registered: their callbacks are code, so the caller adds
/// them using each [`TaskConfig::period`](super::TaskConfig::period).
pub fn build_scheduler(config: &SchedulerConfig) -> Result<PeriodicScheduler, ConfigError> {
    build_scheduler_with_events(config, EventBus::new())
}

/// Build a scheduler from configuration, reporting to `event_bus`.
pub fn build_scheduler_with_events(
    config: &SchedulerConfig,
    event_bus: EventBus,
) -> Result<PeriodicScheduler, ConfigError> {
    let mut builder = PeriodicScheduler::builder(config.resolution()?).event_bus(event_bus);

    if let Some(name) = &config.thread_name {
        builder = builder.thread_name(name);
    }

    Ok(builder.build()?)
}
