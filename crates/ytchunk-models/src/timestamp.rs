//! Timestamp formatting and timemark parsing.
//!
//! FFmpeg takes seek positions as `HH:MM:SS.mmm` and reports progress as
//! `HH:MM:SS.micro` timemarks. Both directions live here so the seek
//! argument and the progress marker agree on the same clock.

use thiserror::Error;

/// Format a seek offset in seconds as `HH:MM:SS.000`.
///
/// Sub-second precision is dropped; milliseconds are always `.000`.
///
/// # Examples
/// ```
/// use ytchunk_models::timestamp::seconds_to_time;
/// assert_eq!(seconds_to_time(3661.0), "01:01:01.000");
/// assert_eq!(seconds_to_time(0.0), "00:00:00.000");
/// ```
pub fn seconds_to_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let hours = (seconds / 3600.0).floor() as u64;
    let mins = ((seconds % 3600.0) / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;

    format!("{:02}:{:02}:{:02}.000", hours, mins, secs)
}

/// Parse an FFmpeg timemark (`HH:MM:SS` or `HH:MM:SS.fraction`) into seconds.
///
/// # Examples
/// ```
/// use ytchunk_models::timestamp::parse_timemark;
/// assert_eq!(parse_timemark("01:01:01.000").unwrap(), 3661.0);
/// assert_eq!(parse_timemark("00:00:19.600000").unwrap(), 19.6);
/// ```
pub fn parse_timemark(timemark: &str) -> Result<f64, TimestampError> {
    let timemark = timemark.trim();
    if timemark.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = timemark.split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(TimestampError::InvalidFormat(timemark.to_string()));
    };

    let hours: u64 = h
        .parse()
        .map_err(|_| TimestampError::InvalidValue("hours", h.to_string()))?;
    let minutes: u64 = m
        .parse()
        .map_err(|_| TimestampError::InvalidValue("minutes", m.to_string()))?;
    let seconds: f64 = s
        .parse()
        .map_err(|_| TimestampError::InvalidValue("seconds", s.to_string()))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TimestampError::InvalidValue("seconds", s.to_string()));
    }

    Ok((hours * 3600 + minutes * 60) as f64 + seconds)
}

/// Timemark parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timemark cannot be empty")]
    Empty,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timemark format '{0}'. Expected HH:MM:SS or HH:MM:SS.fraction")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_time() {
        assert_eq!(seconds_to_time(0.0), "00:00:00.000");
        assert_eq!(seconds_to_time(10.0), "00:00:10.000");
        assert_eq!(seconds_to_time(90.0), "00:01:30.000");
        assert_eq!(seconds_to_time(3661.0), "01:01:01.000");
        assert_eq!(seconds_to_time(86399.0), "23:59:59.000");
    }

    #[test]
    fn test_seconds_to_time_drops_fraction() {
        assert_eq!(seconds_to_time(12.75), "00:00:12.000");
    }

    #[test]
    fn test_parse_timemark() {
        assert_eq!(parse_timemark("00:00:00").unwrap(), 0.0);
        assert_eq!(parse_timemark("01:01:01.000").unwrap(), 3661.0);
        assert!((parse_timemark("00:00:30.500000").unwrap() - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_timemark_errors() {
        assert_eq!(parse_timemark(""), Err(TimestampError::Empty));
        assert!(matches!(parse_timemark("N/A"), Err(TimestampError::InvalidFormat(_))));
        assert!(matches!(parse_timemark("1:2"), Err(TimestampError::InvalidFormat(_))));
        assert!(matches!(
            parse_timemark("-577014:32:22.771806"),
            Err(TimestampError::InvalidValue("hours", _))
        ));
        assert!(matches!(
            parse_timemark("00:00:xx"),
            Err(TimestampError::InvalidValue("seconds", _))
        ));
    }

    #[test]
    fn test_round_trip_under_24_hours() {
        for secs in (0u64..86_400).step_by(7) {
            let formatted = seconds_to_time(secs as f64);
            assert_eq!(parse_timemark(&formatted).unwrap(), secs as f64, "{}", formatted);
        }
        assert_eq!(parse_timemark(&seconds_to_time(86_399.0)).unwrap(), 86_399.0);
    }
}
