//! Conversion between audio offsets in seconds and `HH:MM:SS` display timestamps.

use crate::{Error, Result};

/// Format an offset in seconds as `HH:MM:SS`. Fractional seconds are truncated.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Parse a display timestamp back into seconds.
///
/// Accepts `HH:MM:SS`, `MM:SS` or a bare number of seconds. The last component
/// may carry a fractional part (`00:02:35.5`). Every field is honoured, so
/// `01:00:05` is 3605 seconds.
pub fn parse_timestamp(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidTimestamp(s.to_string()));
    }

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > 3 {
        return Err(Error::InvalidTimestamp(s.to_string()));
    }

    let (whole, last) = parts.split_at(parts.len() - 1);
    let seconds: f64 = last[0]
        .parse()
        .map_err(|_| Error::InvalidTimestamp(s.to_string()))?;
    if !seconds.is_finite() || seconds < 0.0 || (!whole.is_empty() && seconds >= 60.0) {
        return Err(Error::InvalidTimestamp(s.to_string()));
    }

    let mut total = 0u64;
    for (i, part) in whole.iter().enumerate() {
        let value: u64 = part
            .parse()
            .map_err(|_| Error::InvalidTimestamp(s.to_string()))?;
        // Minutes are bounded only when an hours field precedes them.
        if i > 0 && value >= 60 {
            return Err(Error::InvalidTimestamp(s.to_string()));
        }
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(value))
            .ok_or_else(|| Error::InvalidTimestamp(s.to_string()))?;
    }

    Ok(total as f64 * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(155.9), "00:02:35");
        assert_eq!(format_timestamp(3605.0), "01:00:05");
        assert_eq!(format_timestamp(-4.0), "00:00:00");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:02:35").unwrap(), 155.0);
        assert_eq!(parse_timestamp("01:00:05").unwrap(), 3605.0);
        assert_eq!(parse_timestamp("02:35").unwrap(), 155.0);
        assert_eq!(parse_timestamp("42").unwrap(), 42.0);
        assert_eq!(parse_timestamp("00:00:01.5").unwrap(), 1.5);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("aa:bb").is_err());
        assert!(parse_timestamp("00:75:00").is_err());
        assert!(parse_timestamp("00:00:60").is_err());
        assert!(parse_timestamp("1:2:3:4").is_err());
    }

    #[test]
    fn test_parse_timestamp_rejects_overflowing_hours() {
        let err = parse_timestamp("18446744073709551615:00:00").unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp(_)));
    }

    #[test]
    fn test_round_trip_of_display_value() {
        let shown = format_timestamp(4321.7);
        assert_eq!(parse_timestamp(&shown).unwrap(), 4321.0);
    }
}
