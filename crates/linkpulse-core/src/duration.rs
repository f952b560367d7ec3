//! Human-friendly duration strings: `"500ms"`, `"2s"`, `"1m"`, `"1h"`, or a
//! bare number of seconds.

use std::num::IntErrorKind;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("{0:?} does not start with a number")]
    MissingNumber(String),
    #[error("unknown unit {unit:?} in {input:?}, expected ms, s, m or h")]
    UnknownUnit { input: String, unit: String },
    #[error("{0:?} is too large")]
    Overflow(String),
}

/// Parse a duration string.
///
/// The value is a non-negative integer followed by an optional unit.
/// Whitespace around the value and between number and unit is ignored.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let value: u64 = digits.parse().map_err(|e: std::num::ParseIntError| {
        match e.kind() {
            IntErrorKind::PosOverflow => DurationError::Overflow(input.to_string()),
            _ => DurationError::MissingNumber(input.to_string()),
        }
    })?;

    let millis_per_unit: u64 = match unit.trim() {
        "ms" => 1,
        "" | "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => {
            return Err(DurationError::UnknownUnit {
                input: input.to_string(),
                unit: other.to_string(),
            });
        }
    };

    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| DurationError::Overflow(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn bare_number_is_seconds() {
        assert_eq!(parse_duration("10"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn surrounding_and_inner_whitespace() {
        assert_eq!(parse_duration(" 30s "), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("5 ms"), Ok(Duration::from_millis(5)));
    }

    #[test]
    fn huge_minute_value_is_rejected_not_wrapped() {
        assert_eq!(
            parse_duration("999999999999999999m"),
            Err(DurationError::Overflow("999999999999999999m".to_string()))
        );
        assert!(matches!(
            parse_duration("99999999999999999999999s"),
            Err(DurationError::Overflow(_))
        ));
    }

    #[test]
    fn malformed_input() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(parse_duration("   "), Err(DurationError::Empty));
        assert!(matches!(parse_duration("soon"), Err(DurationError::MissingNumber(_))));
        assert!(matches!(parse_duration("-1s"), Err(DurationError::MissingNumber(_))));
        assert!(matches!(
            parse_duration("5d"),
            Err(DurationError::UnknownUnit { ref unit, .. }) if unit == "d"
        ));
        assert!(matches!(parse_duration("1.5s"), Err(DurationError::UnknownUnit { .. })));
    }
}
