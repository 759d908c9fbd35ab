//! metronome - run periodic counter tasks from the command line.
//!
//! Usage:
//!   metronome run <config>       Run one counter per task defined in a config file
//!   metronome demo               Walk through add, remove, stop and resume
//!   metronome validate <config>  Validate a config file without running

use clap::{Parser, Subcommand};
use metronome::config::build_scheduler_with_events;
use metronome::{
    EventBus, EventHandler, PeriodicScheduler, SchedulerEvent, TaskId, TaskSnapshot, YamlLoader,
    parse_duration,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

/// metronome - A minimal periodic task scheduler
#[derive(Parser)]
#[command(name = "metronome")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one counter task per entry in a config file
    Run {
        /// Path to the scheduler YAML file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Stop after this long (default: run until Ctrl+C)
        #[arg(long = "for", value_name = "DURATION", value_parser = parse_duration)]
        run_for: Option<Duration>,

        /// Print the final task summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Walk through adding, removing, stopping and resuming tasks
    Demo {
        /// Length of each demo phase
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        phase: Duration,
    },

    /// Validate a config file without running
    Validate {
        /// Path to the scheduler YAML file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

/// Warns when a task fires noticeably after its due instant.
struct LatenessMonitor {
    threshold: Duration,
}

impl EventHandler for LatenessMonitor {
    fn handle(&self, event: &SchedulerEvent) {
        if let SchedulerEvent::TaskFired {
            task_id, lateness, ..
        } = event
            && *lateness > self.threshold
        {
            warn!("Task {} fired {:?} late", task_id, lateness);
        }
    }
}

/// Lateness beyond which the monitor warns: two resolutions.
fn lateness_threshold(resolution: Duration) -> Duration {
    resolution.saturating_mul(2)
}

/// Length of the stop and resume phases of the demo: 30% of a full phase.
fn short_phase(phase: Duration) -> Duration {
    phase
        .checked_mul(3)
        .map(|d| d / 10)
        .unwrap_or_else(|| phase / 10 * 3)
}

/// Final per-task report.
#[derive(Serialize)]
struct TaskSummary {
    name: String,
    #[serde(flatten)]
    snapshot: TaskSnapshot,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            run_for,
            json,
        } => {
            run_config(config, run_for, json).await?;
        }
        Commands::Demo { phase } => {
            run_demo(phase).await?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
    }

    Ok(())
}

/// A callback that counts its firings and logs each one.
fn counter_task(label: String, count: Arc<AtomicU64>) -> impl FnMut() + Send + 'static {
    move || {
        let n = count.fetch_add(1, Ordering::SeqCst) + 1;
        info!("{} number: {}", label, n);
    }
}

/// Run the tasks from a config file until Ctrl+C or the optional deadline.
async fn run_config(
    path: PathBuf,
    run_for: Option<Duration>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading config from: {}", path.display());
    let config = YamlLoader::load_config(&path)?;

    if config.tasks.is_empty() {
        warn!("No tasks defined in {}", path.display());
        return Ok(());
    }

    let resolution = config.resolution()?;
    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LatenessMonitor {
        threshold: lateness_threshold(resolution),
    }));
    let scheduler = build_scheduler_with_events(&config, event_bus)?;

    let mut names: Vec<(TaskId, String)> = Vec::with_capacity(config.tasks.len());
    info!(
        "Scheduling {} task(s) at {:?} resolution:",
        config.tasks.len(),
        resolution
    );
    for task in &config.tasks {
        let period = task.period()?;
        let id = scheduler.add_task(
            counter_task(task.name.clone(), Arc::new(AtomicU64::new(0))),
            period,
        )?;
        info!("  - {} (id {}) every {:?}", task.name, id, period);
        names.push((id, task.name.clone()));
    }

    info!("Press Ctrl+C to stop");
    match run_for {
        Some(limit) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                }
                _ = tokio::time::sleep(limit) => {
                    info!("Ran for {:?}", limit);
                }
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Interrupted");
        }
    }

    scheduler.stop();
    print_summary(&scheduler, &names, json)?;
    info!("Goodbye!");
    Ok(())
}

/// Print how often each task fired.
fn print_summary(
    scheduler: &PeriodicScheduler,
    names: &[(TaskId, String)],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let summaries: Vec<TaskSummary> = scheduler
        .snapshot()
        .into_iter()
        .map(|snapshot| TaskSummary {
            name: names
                .iter()
                .find(|(id, _)| *id == snapshot.id)
                .map(|(_, name)| name.clone())
                .unwrap_or_default(),
            snapshot,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    for summary in &summaries {
        println!(
            "{}: fired {} time(s) every {:?}",
            summary.name, summary.snapshot.fire_count, summary.snapshot.period
        );
        if summary.snapshot.panic_count > 0 {
            println!("  panicked {} time(s)", summary.snapshot.panic_count);
        }
    }

    Ok(())
}

/// Two counters at 1s and 100ms; the fast one is removed, then the
/// scheduler is stopped and resumed.
async fn run_demo(phase: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = PeriodicScheduler::new(Duration::from_millis(1))?;
    let short_phase = short_phase(phase);

    scheduler.add_task(
        counter_task("Second".to_string(), Arc::new(AtomicU64::new(0))),
        Duration::from_secs(1),
    )?;

    let millis = Arc::new(AtomicU64::new(0));
    let millis_id = scheduler.add_task(
        move || {
            let n = millis.fetch_add(1, Ordering::SeqCst) + 1;
            info!("Millisecond number: {}", n * 100);
        },
        Duration::from_millis(100),
    )?;

    tokio::time::sleep(phase).await;
    scheduler.remove_task(millis_id);
    info!("Removed the 100ms task");

    tokio::time::sleep(phase).await;
    scheduler.stop();
    info!("Stopped for {:?}", short_phase);

    tokio::time::sleep(short_phase).await;
    if let Err(e) = scheduler.resume() {
        error!("Failed to resume: {}", e);
        return Err(e.into());
    }
    info!("Resumed");

    tokio::time::sleep(short_phase).await;
    scheduler.stop();
    info!("Done!");
    Ok(())
}

/// Validate a config file without running.
fn validate_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating config: {}", path.display());

    match YamlLoader::load_config(&path) {
        Ok(config) => {
            info!(
                "Config is valid: {} task(s) at {} resolution",
                config.tasks.len(),
                config.resolution
            );
            for task in &config.tasks {
                info!("  - {} every {}", task.name, task.period);
            }
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e.into())
        }
    }
}
