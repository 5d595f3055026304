//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};
use ytchunk_models::parse_timemark;

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as a timemark (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Position in seconds, parsed from the timemark.
    ///
    /// Falls back to `out_time_ms` when the timemark is missing or `N/A`
    /// (FFmpeg reports that before the first packet is written).
    pub fn position_secs(&self) -> Option<f64> {
        parse_timemark(&self.out_time).ok().or_else(|| {
            (self.out_time_ms > 0).then(|| self.out_time_ms as f64 / 1000.0)
        })
    }
}

/// Parse a progress line from FFmpeg's -progress output.
///
/// Returns a snapshot every time a `progress=` block terminator is seen.
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();

    let (key, value) = line.split_once('=')?;
    match key {
        "out_time_ms" | "out_time_us" => {
            // Both keys are in microseconds in practice; out_time_ms is misnamed
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "out_time" => {
            current.out_time = value.to_string();
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

/// Whether a stderr line belongs to the `-progress` key/value stream.
pub fn is_progress_line(line: &str) -> bool {
    match line.trim().split_once('=') {
        Some((key, _)) => !key.is_empty() && !key.contains(char::is_whitespace),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(parse_progress_line("frame=120", &mut progress).is_none());
        assert!(parse_progress_line("out_time_us=5000000", &mut progress).is_none());
        assert!(parse_progress_line("out_time=00:00:05.000000", &mut progress).is_none());
        assert!(parse_progress_line("speed=1.5x", &mut progress).is_none());

        let snapshot = parse_progress_line("progress=continue", &mut progress).unwrap();
        assert_eq!(snapshot.frame, 120);
        assert_eq!(snapshot.out_time_ms, 5000);
        assert!((snapshot.speed - 1.5).abs() < 0.01);
        assert!(!snapshot.is_complete);
        assert_eq!(snapshot.position_secs(), Some(5.0));

        let end = parse_progress_line("progress=end", &mut progress).unwrap();
        assert!(end.is_complete);
    }

    #[test]
    fn test_speed_not_available() {
        let mut progress = FfmpegProgress::default();
        parse_progress_line("speed=N/A", &mut progress);
        assert_eq!(progress.speed, 0.0);
    }

    #[test]
    fn test_position_falls_back_to_out_time_ms() {
        let progress = FfmpegProgress {
            out_time: "N/A".to_string(),
            out_time_ms: 2500,
            ..Default::default()
        };
        assert_eq!(progress.position_secs(), Some(2.5));

        assert_eq!(FfmpegProgress::default().position_secs(), None);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(is_progress_line("out_time=00:00:01.000000"));
        assert!(is_progress_line("progress=continue"));
        assert!(!is_progress_line("pipe:0: Invalid data found when processing input"));
        assert!(!is_progress_line("Error while decoding stream #0:1 = bad"));
    }
}
