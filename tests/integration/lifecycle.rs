//! Stop, resume and teardown tests.

use metronome::testing::{FireCounter, wait_until};
use metronome::{PeriodicScheduler, SchedulerState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::common::{RESOLUTION, WAIT, assert_near, fires_during, ms};

#[test]
fn test_stop_halts_firing_without_clearing_tasks() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();
    let counter = FireCounter::new();
    let id = scheduler.add_task(counter.callback(), ms(20)).unwrap();
    assert!(wait_until(WAIT, || counter.count() >= 3));

    scheduler.stop();
    // Let an in-flight pass finish.
    std::thread::sleep(ms(50));

    assert_eq!(fires_during(&counter, ms(200)), 0);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(scheduler.contains(id));
}

#[test]
fn test_resume_does_not_catch_up_stopped_time() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();
    let counter = FireCounter::new();
    scheduler.add_task(counter.callback(), ms(200)).unwrap();
    assert!(wait_until(WAIT, || counter.count() >= 1));

    scheduler.stop();
    std::thread::sleep(ms(600));
    let before = counter.count();

    let resumed_at = Instant::now();
    scheduler.resume().unwrap();

    std::thread::sleep(ms(120));
    assert_eq!(counter.count(), before, "task fired to catch up after resume");

    assert!(wait_until(WAIT, || counter.count() > before));
    assert!(resumed_at.elapsed() >= ms(200));
    assert_eq!(counter.count(), before + 1);
}

#[test]
fn test_repeated_stop_and_resume_are_safe() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();
    let counter = FireCounter::new();
    scheduler.add_task(counter.callback(), ms(50)).unwrap();

    scheduler.stop();
    scheduler.stop();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    scheduler.resume().unwrap();
    scheduler.resume().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Running);

    // A single loop drives the task: cadence is not doubled.
    let fired = fires_during(&counter, ms(500));
    assert_near("50ms task over 500ms", fired, 10, 2);
}

#[test]
fn test_tasks_added_while_stopped_wait_for_resume() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();
    let counter = FireCounter::new();
    scheduler.add_task(|| {}, ms(1000)).unwrap();
    scheduler.stop();

    scheduler.add_task(counter.callback(), ms(20)).unwrap();
    std::thread::sleep(ms(100));
    assert_eq!(counter.count(), 0);
    assert_eq!(scheduler.len(), 2);

    scheduler.resume().unwrap();
    assert!(wait_until(WAIT, || counter.count() >= 2));
}

#[test]
fn test_drop_waits_for_loop_and_stops_callbacks() {
    let counter = FireCounter::new();
    let scheduler = PeriodicScheduler::new(ms(1)).unwrap();
    scheduler.add_task(counter.callback(), ms(5)).unwrap();
    assert!(wait_until(WAIT, || counter.count() >= 2));

    drop(scheduler);
    let at_drop = counter.count();
    assert_eq!(fires_during(&counter, ms(50)), 0);
    assert_eq!(counter.count(), at_drop);
}

#[test]
fn test_panicking_task_keeps_loop_alive() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();
    let bad = scheduler.add_task(|| panic!("flaky sensor"), ms(20)).unwrap();
    let counter = FireCounter::new();
    scheduler.add_task(counter.callback(), ms(20)).unwrap();

    assert!(wait_until(WAIT, || counter.count() >= 5));
    assert!(scheduler.is_running());

    let snap = scheduler.snapshot();
    let bad_snap = snap.iter().find(|s| s.id == bad).unwrap();
    assert!(bad_snap.panic_count >= 1);
    assert_eq!(bad_snap.panic_count, bad_snap.fire_count);
}

#[test]
fn test_blocking_callback_holds_task_lock() {
    let scheduler = Arc::new(PeriodicScheduler::new(RESOLUTION).unwrap());
    let entered = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&entered);

    scheduler
        .add_task(
            move || {
                flag.store(true, Ordering::SeqCst);
                std::thread::sleep(ms(200));
            },
            ms(50),
        )
        .unwrap();

    assert!(wait_until(WAIT, || entered.load(Ordering::SeqCst)));

    // Registration waits for the running callback to return.
    let started = Instant::now();
    scheduler.add_task(|| {}, ms(1000)).unwrap();
    assert!(
        started.elapsed() >= ms(100),
        "add_task returned after {:?} while a callback held the lock",
        started.elapsed()
    );
}
