use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,
    #[error("invalid number {0:?} in duration")]
    InvalidNumber(String),
    #[error("missing unit in duration {0:?} (use ns, us, ms, s, m or h)")]
    MissingUnit(String),
    #[error("unknown unit {0:?} in duration")]
    UnknownUnit(String),
    #[error("duration {0:?} is out of range")]
    OutOfRange(String),
}

/// Parses durations written the way Go's `time.ParseDuration` accepts them:
/// a sequence of decimal numbers, each with an optional fraction and a unit,
/// such as `30s`, `1m30s`, `1.5h` or `250ms`. A bare `0` is allowed.
///
/// Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| DurationParseError::MissingUnit(input.to_string()))?;
        let (number, tail) = rest.split_at(number_end);
        let value: f64 = number
            .parse()
            .map_err(|_| DurationParseError::InvalidNumber(number.to_string()))?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let unit_nanos = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            other => return Err(DurationParseError::UnknownUnit(other.to_string())),
        };

        total_nanos += value * unit_nanos;
        rest = next;
    }

    if total_nanos > u64::MAX as f64 {
        return Err(DurationParseError::OutOfRange(input.to_string()));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
