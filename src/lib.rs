//! metronome - A minimal in-process periodic task scheduler.
//!
//! Register callbacks with a fixed period; one background thread wakes at a
//! fixed resolution and fires every task whose period has elapsed. Periods
//! advance by whole steps from their due instant, so a late tick does not
//! shift a task's long-run cadence.
//!
//! ```no_run
//! use metronome::PeriodicScheduler;
//! use std::time::Duration;
//!
//! let scheduler = PeriodicScheduler::new(Duration::from_millis(10))?;
//! let id = scheduler.add_task(|| println!("tick"), Duration::from_millis(100))?;
//! std::thread::sleep(Duration::from_secs(1));
//! scheduler.remove_task(id);
//! # Ok::<(), metronome::SchedulerError>(())
//! ```

pub mod config;
pub mod core;
pub mod events;
pub mod scheduler;
pub mod testing;

pub use config::{ConfigError, SchedulerConfig, TaskConfig, YamlLoader, build_scheduler};
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::duration::{DurationError, parse_duration};
pub use crate::core::task::{TaskCallback, TaskSnapshot};
pub use crate::core::types::TaskId;
pub use events::{EventBus, EventHandler, SchedulerEvent};
pub use scheduler::{PeriodicScheduler, SchedulerBuilder, SchedulerError, SchedulerState};
