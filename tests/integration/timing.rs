//! Real-time cadence tests.
//!
//! These run the background loop against the system clock, so counts carry
//! a small tolerance for scheduling jitter.

use metronome::PeriodicScheduler;
use metronome::testing::FireCounter;
use std::time::Duration;

use crate::common::{RESOLUTION, assert_near, fires_during, ms};

#[test]
fn test_independent_periods_and_removal() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();
    let slow = FireCounter::new();
    let fast = FireCounter::new();

    let slow_id = scheduler.add_task(slow.callback(), ms(1000)).unwrap();
    scheduler.add_task(fast.callback(), ms(100)).unwrap();

    std::thread::sleep(ms(1050));
    assert_near("1000ms task after 1s", slow.count(), 1, 1);
    assert_near("100ms task after 1s", fast.count(), 10, 2);

    assert!(scheduler.remove_task(slow_id));
    let slow_after_removal = slow.count();

    let fast_fires = fires_during(&fast, ms(1000));
    assert_eq!(slow.count(), slow_after_removal);
    assert_near("100ms task in second window", fast_fires, 10, 2);
}

#[test]
fn test_fire_count_tracks_elapsed_time() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();
    let counter = FireCounter::new();
    scheduler.add_task(counter.callback(), ms(50)).unwrap();

    std::thread::sleep(ms(1025));
    assert_near("50ms task over 1s", counter.count(), 20, 2);
}

#[test]
fn test_stalled_pass_does_not_shift_phase() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();

    // Registered first, so it runs first in the pass and stalls it once.
    let mut stalled = false;
    scheduler
        .add_task(
            move || {
                if !stalled {
                    stalled = true;
                    std::thread::sleep(ms(250));
                }
            },
            ms(100),
        )
        .unwrap();

    let counter = FireCounter::new();
    scheduler.add_task(counter.callback(), ms(100)).unwrap();

    // Without drift correction the task would re-base to the late firing at
    // ~350ms and reach only ~7 firings by 1s.
    std::thread::sleep(ms(1050));
    assert_near("100ms task after a 250ms stall", counter.count(), 10, 1);
}

#[test]
fn test_period_below_resolution_is_bounded_by_passes() {
    let resolution = ms(20);
    let scheduler = PeriodicScheduler::new(resolution).unwrap();
    let counter = FireCounter::new();
    scheduler
        .add_task(counter.callback(), Duration::from_millis(2))
        .unwrap();

    std::thread::sleep(ms(400));
    let fired = counter.count();

    // 200 periods elapsed, but only ~20 passes ran.
    assert!(fired >= 10, "expected at least 10 firings, got {}", fired);
    assert!(fired <= 25, "expected at most one firing per pass, got {}", fired);
}
