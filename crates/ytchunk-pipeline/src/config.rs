//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding in-flight artifacts
    pub temp_dir: PathBuf,
    /// Lower bound of the job deadline
    pub deadline_floor: Duration,
    /// Deadline as a multiple of the chunk duration
    pub deadline_multiplier: u32,
    /// Stall detector sampling interval
    pub stall_interval: Duration,
    /// Identical consecutive samples before a job counts as stalled
    pub stall_samples: u32,
    /// Stop the worker once progress is within this distance of the chunk end
    pub end_tolerance: Duration,
    /// Bound on the source metadata lookup
    pub fetch_timeout: Duration,
    /// How long to wait for a stopped worker to exit before salvaging
    pub exit_grace: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("ytchunk"),
            deadline_floor: Duration::from_secs(30),
            deadline_multiplier: 2,
            stall_interval: Duration::from_secs(1),
            stall_samples: 5,
            end_tolerance: Duration::from_millis(500),
            fetch_timeout: Duration::from_secs(30),
            exit_grace: Duration::from_secs(5),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            temp_dir: std::env::var("PIPELINE_TEMP_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            deadline_floor: env_secs("PIPELINE_DEADLINE_FLOOR_SECS").unwrap_or(defaults.deadline_floor),
            deadline_multiplier: env_parse("PIPELINE_DEADLINE_MULTIPLIER")
                .unwrap_or(defaults.deadline_multiplier),
            stall_interval: env_parse("PIPELINE_STALL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.stall_interval),
            stall_samples: env_parse::<u32>("PIPELINE_STALL_SAMPLES")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.stall_samples),
            end_tolerance: env_parse("PIPELINE_END_TOLERANCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.end_tolerance),
            fetch_timeout: env_secs("PIPELINE_FETCH_TIMEOUT_SECS").unwrap_or(defaults.fetch_timeout),
            exit_grace: env_secs("PIPELINE_EXIT_GRACE_SECS").unwrap_or(defaults.exit_grace),
        }
    }

    /// Wall-clock bound for a chunk: `max(floor, multiplier × duration)`.
    pub fn deadline_for(&self, duration: Duration) -> Duration {
        self.deadline_floor
            .max(duration.saturating_mul(self.deadline_multiplier))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse(key).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_floor_applies_to_short_chunks() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.deadline_for(Duration::from_secs(5)),
            Duration::from_secs(30)
        );
        assert_eq!(
            config.deadline_for(Duration::from_secs(15)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_deadline_scales_with_duration() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.deadline_for(Duration::from_secs(20)),
            Duration::from_secs(40)
        );
        assert_eq!(
            config.deadline_for(Duration::from_secs(600)),
            Duration::from_secs(1200)
        );
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.stall_interval, Duration::from_secs(1));
        assert_eq!(config.stall_samples, 5);
        assert_eq!(config.end_tolerance, Duration::from_millis(500));
        assert!(config.temp_dir.ends_with("ytchunk"));
    }
}
