//! Human-readable duration parsing.
//!
//! Accepts one or more `<number><unit>` pairs written back to back, such as
//! `"250ms"`, `"1s"` or `"1h30m"`. Supported units are `ns`, `us`, `ms`, `s`,
//! `m`, `h` and `d`.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when parsing a duration string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// The string was empty.
    #[error("empty duration")]
    Empty,

    /// A number was not followed by a unit, or a unit had no number.
    #[error("malformed duration: {0}")]
    Malformed(String),

    /// Unknown unit suffix.
    #[error("unknown duration unit '{unit}' in '{input}'")]
    UnknownUnit { input: String, unit: String },

    /// The total does not fit in a `Duration`.
    #[error("duration out of range: {0}")]
    Overflow(String),

    /// The total is zero.
    #[error("duration must be positive: {0}")]
    Zero(String),
}

/// Parse a duration string like `"5m"`, `"1h30m"` or `"500ms"`.
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;

    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(DurationError::Malformed(trimmed.to_string()));
        }
        let num: u64 = rest[..digits]
            .parse()
            .map_err(|_| DurationError::Overflow(trimmed.to_string()))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        if unit_len == 0 {
            return Err(DurationError::Malformed(trimmed.to_string()));
        }
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = unit_duration(trimmed, unit, num)?;
        total = total
            .checked_add(part)
            .ok_or_else(|| DurationError::Overflow(trimmed.to_string()))?;
    }

    if total.is_zero() {
        return Err(DurationError::Zero(trimmed.to_string()));
    }

    Ok(total)
}

fn unit_duration(input: &str, unit: &str, num: u64) -> Result<Duration, DurationError> {
    let overflow = || DurationError::Overflow(input.to_string());
    let secs = |factor: u64| {
        num.checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(overflow)
    };

    match unit {
        "ns" => Ok(Duration::from_nanos(num)),
        "us" | "µs" => Ok(Duration::from_micros(num)),
        "ms" => Ok(Duration::from_millis(num)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(3600),
        "d" => secs(86400),
        other => Err(DurationError::UnknownUnit {
            input: input.to_string(),
            unit: other.to_string(),
        }),
    }
}
