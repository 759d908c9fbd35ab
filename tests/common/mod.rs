//! Common test utilities shared across integration tests.

use metronome::testing::FireCounter;
use std::time::Duration;

/// Resolution used by the real-time tests.
pub const RESOLUTION: Duration = Duration::from_millis(10);

/// Upper bound when waiting on the background loop.
pub const WAIT: Duration = Duration::from_secs(5);

/// Shorthand for milliseconds.
pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Count firings over a fixed window.
///
/// Returns the number of times `counter` advanced while the current thread
/// slept for `window`.
pub fn fires_during(counter: &FireCounter, window: Duration) -> u64 {
    let before = counter.count();
    std::thread::sleep(window);
    counter.count() - before
}

/// Assert that `actual` is within `tolerance` of `expected`.
///
/// # Panics
///
/// Panics with a descriptive message when the value is out of range.
pub fn assert_near(label: &str, actual: u64, expected: u64, tolerance: u64) {
    let low = expected.saturating_sub(tolerance);
    let high = expected + tolerance;
    assert!(
        (low..=high).contains(&actual),
        "{}: expected {}±{}, got {}",
        label,
        expected,
        tolerance,
        actual
    );
}
