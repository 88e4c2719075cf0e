//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use mailfit_media::EncodeLimits;
use mailfit_models::PlannerConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Scratch directory for in-flight source and result files
    pub scratch_dir: PathBuf,
    /// How long one queue pop blocks before reporting empty
    pub poll_timeout: Duration,
    /// Sleep after an empty poll
    pub idle_sleep: Duration,
    /// Backoff after a queue error
    pub error_backoff: Duration,
    /// Age past which leftover scratch files are swept
    pub scratch_retention: Duration,
    /// TTL for minted retrieval URLs
    pub url_ttl: Duration,
    /// Recipient of last resort when neither the message nor the record has one
    pub fallback_email: String,
    /// Budget planner constants
    pub planner: PlannerConfig,
    /// Resource ceilings for the encoder child process
    pub encode_limits: EncodeLimits,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("/tmp/mailfit"),
            poll_timeout: Duration::from_secs(3),
            idle_sleep: Duration::from_secs(1),
            error_backoff: Duration::from_secs(2),
            scratch_retention: Duration::from_secs(900),
            url_ttl: Duration::from_secs(86400),
            fallback_email: "noemail@mailfit.dev".to_string(),
            planner: PlannerConfig::default(),
            encode_limits: EncodeLimits::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let planner = PlannerConfig {
            safety_margin_mb: std::env::var("PLAN_SAFETY_MARGIN_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.planner.safety_margin_mb),
            overhead_factor: std::env::var("PLAN_OVERHEAD_FACTOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.planner.overhead_factor),
            min_video_kbps: std::env::var("PLAN_MIN_VIDEO_KBPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.planner.min_video_kbps),
            ..PlannerConfig::default()
        };

        let encode_limits = EncodeLimits {
            cpu_secs: std::env::var("ENCODE_CPU_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.encode_limits.cpu_secs),
            memory_bytes: std::env::var("ENCODE_MEMORY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.encode_limits.memory_bytes),
            wall_clock: Duration::from_secs(
                std::env::var("ENCODE_WALL_CLOCK_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.encode_limits.wall_clock.as_secs()),
            ),
            ..EncodeLimits::default()
        };

        Self {
            scratch_dir: std::env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            poll_timeout: Duration::from_secs(
                std::env::var("QUEUE_POLL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.poll_timeout.as_secs()),
            ),
            idle_sleep: Duration::from_secs(
                std::env::var("IDLE_SLEEP_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.idle_sleep.as_secs()),
            ),
            error_backoff: Duration::from_secs(
                std::env::var("ERROR_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.error_backoff.as_secs()),
            ),
            scratch_retention: Duration::from_secs(
                std::env::var("SCRATCH_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.scratch_retention.as_secs()),
            ),
            url_ttl: Duration::from_secs(
                std::env::var("DOWNLOAD_URL_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.url_ttl.as_secs()),
            ),
            fallback_email: std::env::var("FALLBACK_EMAIL").unwrap_or(defaults.fallback_email),
            planner,
            encode_limits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_secs(3));
        assert_eq!(config.idle_sleep, Duration::from_secs(1));
        assert_eq!(config.scratch_retention, Duration::from_secs(900));
        assert_eq!(config.url_ttl, Duration::from_secs(86400));
        assert!(config.fallback_email.contains('@'));
    }
}
