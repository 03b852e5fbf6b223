use std::time::Duration;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("durations must not be negative")]
    Negative,

    #[error("invalid floating-point number: {}", .0)]
    NotANumber(#[from] std::num::ParseFloatError),

    #[error("duration is out of range")]
    Overflow,
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', '\u{00b5}s', 'ms', 's', 'm', or 'h'";

/// Parses a duration in Go's `time.ParseDuration` format, e.g. `1m30s` or `250ms`.
pub fn parse_duration(s: &str) -> Result<Duration, ParseError> {
    let mut s = s.trim();
    if s.contains('-') {
        return Err(ParseError::Negative);
    }
    s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(ParseError::NoUnit);
    }

    let mut total = Duration::ZERO;
    while !s.is_empty() {
        let unit_start = s
            .find(|c: char| c.is_alphabetic())
            .ok_or(ParseError::NoUnit)?;
        let (val, rest) = s.split_at(unit_start);
        let val = val.parse::<f64>()?;
        let (unit, rest) = match rest.find(|c: char| !c.is_alphabetic()) {
            Some(end) => rest.split_at(end),
            None => (rest, ""),
        };
        let d = Duration::try_from_secs_f64(unit_duration(unit)?.as_secs_f64() * val)
            .map_err(|_| ParseError::Overflow)?;
        total = total.checked_add(d).ok_or(ParseError::Overflow)?;
        s = rest;
    }
    Ok(total)
}

fn unit_duration(unit: &str) -> Result<Duration, ParseError> {
    const MINUTE: Duration = Duration::from_secs(60);
    match unit {
        "ns" => Ok(Duration::from_nanos(1)),
        // U+00B5 is the "micro sign" while U+03BC is "Greek letter mu"
        "us" | "\u{00b5}s" | "\u{03bc}s" => Ok(Duration::from_micros(1)),
        "ms" => Ok(Duration::from_millis(1)),
        "s" => Ok(Duration::from_secs(1)),
        "m" => Ok(MINUTE),
        "h" => Ok(MINUTE * 60),
        _ => Err(ParseError::InvalidUnit),
    }
}
