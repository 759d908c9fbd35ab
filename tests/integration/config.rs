//! Building and running a scheduler from a config file.

use metronome::testing::{FireCounter, wait_until};
use metronome::{YamlLoader, build_scheduler};
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::common::{WAIT, ms};

#[test]
fn test_scheduler_from_config_file_runs_on_named_thread() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
resolution: 2ms
thread_name: config-loop
tasks:
  - name: heartbeat
    period: 10ms
  - name: report
    period: 25ms
"#
    )
    .unwrap();

    let config = YamlLoader::load_config(file.path()).unwrap();
    let scheduler = build_scheduler(&config).unwrap();
    assert_eq!(scheduler.resolution(), ms(2));

    let thread_name = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&thread_name);
    let counter = FireCounter::new();

    for task in &config.tasks {
        let mut tick = counter.callback();
        let seen = Arc::clone(&seen);
        scheduler
            .add_task(
                move || {
                    tick();
                    *seen.lock().unwrap() = std::thread::current().name().map(str::to_string);
                },
                task.period().unwrap(),
            )
            .unwrap();
    }

    assert!(wait_until(WAIT, || counter.count() >= 4));
    assert_eq!(
        thread_name.lock().unwrap().as_deref(),
        Some("config-loop")
    );
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "resolution: fast").unwrap();

    assert!(YamlLoader::load_config(file.path()).is_err());
}
