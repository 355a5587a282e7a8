//! Minimal duration string parsing for the `duration` parameter type.
//!
//! Accepts a bare integer (seconds) or a number followed by one of
//! `ms`/`s`/`m`/`h` (e.g. `"250ms"`, `"30s"`, `"5m"`, `"1h"`).

use std::time::Duration;

/// Parse a duration string. Returns `None` on malformed input.
#[must_use]
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (number_part, unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, "ms")
    } else if let Some(n) = s.strip_suffix('s') {
        (n, "s")
    } else if let Some(n) = s.strip_suffix('m') {
        (n, "m")
    } else if let Some(n) = s.strip_suffix('h') {
        (n, "h")
    } else {
        (s, "s")
    };

    let value: f64 = number_part.parse().ok()?;
    if value < 0.0 {
        return None;
    }

    let millis = match unit {
        "ms" => value,
        "s" => value * 1_000.0,
        "m" => value * 60_000.0,
        "h" => value * 3_600_000.0,
        _ => unreachable!(),
    };

    Some(Duration::from_millis(millis.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_integer_is_seconds() {
        assert_eq!(parse_duration("30"), Some(Duration::from_secs(30)));
    }

    #[test]
    fn suffixed_forms_parse() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
    }

    #[test]
    fn garbage_fails() {
        assert!(parse_duration("soon").is_none());
        assert!(parse_duration("").is_none());
        assert!(parse_duration("-5s").is_none());
    }
}
