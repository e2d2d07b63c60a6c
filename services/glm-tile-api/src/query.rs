//! Parsing for `/tiles` query parameters: the `window` duration and the
//! `t` instant.

use chrono::{DateTime, Utc};

/// Parse a duration string like `"5m"`, `"90s"`, `"500ms"`, `"1h"` into
/// milliseconds. Bare digits (no suffix) are treated as minutes, matching
/// the default unit used elsewhere in the query contract.
pub fn parse_window_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let split_at = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, suffix) = raw.split_at(split_at);
    let suffix = if suffix.is_empty() { "m" } else { suffix };

    let n: i64 = digits.parse().ok()?;
    let scale_ms = match suffix {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        _ => return None,
    };
    Some(n * scale_ms)
}

/// Parse an RFC3339/ISO-8601 UTC instant into epoch milliseconds.
pub fn parse_instant_ms(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_durations() {
        assert_eq!(parse_window_ms("5m"), Some(300_000));
        assert_eq!(parse_window_ms("90s"), Some(90_000));
        assert_eq!(parse_window_ms("500ms"), Some(500));
        assert_eq!(parse_window_ms("2h"), Some(7_200_000));
    }

    #[test]
    fn bare_digits_default_to_minutes() {
        assert_eq!(parse_window_ms("10"), Some(600_000));
    }

    #[test]
    fn rejects_unknown_suffix() {
        assert_eq!(parse_window_ms("5x"), None);
    }

    #[test]
    fn parses_rfc3339_instant() {
        let ms = parse_instant_ms("2025-08-28T00:00:00Z").unwrap();
        assert_eq!(ms, 1_756_339_200_000);
    }
}
