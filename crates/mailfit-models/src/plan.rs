//! Encode budget planning.
//!
//! Maps a destination provider and clip duration onto a byte ceiling, a
//! video bitrate and a resolution cap. Pure arithmetic: same inputs, same
//! plan, no I/O, no failure for any numeric input.

use serde::{Deserialize, Serialize};

use crate::Provider;

const MB: f64 = 1024.0 * 1024.0;

/// Encoding budget for one job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetPlan {
    /// Hard output size ceiling in bytes
    pub target_bytes: u64,

    /// Video bitrate in kbit/s
    pub video_kbps: u32,

    /// Audio bitrate in kbit/s
    pub audio_kbps: u32,

    /// Cap on the longer frame dimension in pixels
    pub max_edge_px: u32,
}

/// Tunable planner constants.
///
/// Deployments have historically disagreed on the exact margins, so every
/// constant is configuration rather than a hard-coded value. The defaults
/// are the most conservative of the values seen in production.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Advertised attachment limit for Gmail, in MB
    #[serde(default = "default_gmail_limit_mb")]
    pub gmail_limit_mb: f64,

    /// Advertised attachment limit for Outlook, in MB
    #[serde(default = "default_outlook_limit_mb")]
    pub outlook_limit_mb: f64,

    /// Advertised attachment limit for everything else, in MB
    #[serde(default = "default_other_limit_mb")]
    pub other_limit_mb: f64,

    /// Slack subtracted from the advertised limit before budgeting, in MB
    #[serde(default = "default_safety_margin_mb")]
    pub safety_margin_mb: f64,

    /// Fraction of the byte budget assumed to survive container overhead
    #[serde(default = "default_overhead_factor")]
    pub overhead_factor: f64,

    /// Fixed audio bitrate in kbit/s
    #[serde(default = "default_audio_kbps")]
    pub audio_kbps: u32,

    /// Floor for the computed video bitrate in kbit/s
    #[serde(default = "default_min_video_kbps")]
    pub min_video_kbps: u32,

    /// Video bitrate at or above which the HD resolution cap applies, in kbit/s
    #[serde(default = "default_hd_threshold_kbps")]
    pub hd_threshold_kbps: u32,

    /// Resolution cap above the threshold, in pixels
    #[serde(default = "default_hd_edge_px")]
    pub hd_edge_px: u32,

    /// Resolution cap below the threshold, in pixels
    #[serde(default = "default_sd_edge_px")]
    pub sd_edge_px: u32,

    /// Lower duration clamp in seconds
    #[serde(default = "default_min_duration_secs")]
    pub min_duration_secs: f64,

    /// Upper duration clamp in seconds
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: f64,
}

fn default_gmail_limit_mb() -> f64 {
    25.0
}

fn default_outlook_limit_mb() -> f64 {
    20.0
}

fn default_other_limit_mb() -> f64 {
    15.0
}

fn default_safety_margin_mb() -> f64 {
    1.5
}

fn default_overhead_factor() -> f64 {
    0.90
}

fn default_audio_kbps() -> u32 {
    96
}

fn default_min_video_kbps() -> u32 {
    240
}

fn default_hd_threshold_kbps() -> u32 {
    800
}

fn default_hd_edge_px() -> u32 {
    1280
}

fn default_sd_edge_px() -> u32 {
    854
}

fn default_min_duration_secs() -> f64 {
    1.0
}

fn default_max_duration_secs() -> f64 {
    7200.0
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            gmail_limit_mb: default_gmail_limit_mb(),
            outlook_limit_mb: default_outlook_limit_mb(),
            other_limit_mb: default_other_limit_mb(),
            safety_margin_mb: default_safety_margin_mb(),
            overhead_factor: default_overhead_factor(),
            audio_kbps: default_audio_kbps(),
            min_video_kbps: default_min_video_kbps(),
            hd_threshold_kbps: default_hd_threshold_kbps(),
            hd_edge_px: default_hd_edge_px(),
            sd_edge_px: default_sd_edge_px(),
            min_duration_secs: default_min_duration_secs(),
            max_duration_secs: default_max_duration_secs(),
        }
    }
}

impl PlannerConfig {
    /// Byte ceiling for a provider: advertised limit minus the safety margin.
    pub fn target_bytes(&self, provider: Provider) -> u64 {
        let limit_mb = match provider {
            Provider::Gmail => self.gmail_limit_mb,
            Provider::Outlook => self.outlook_limit_mb,
            Provider::Other => self.other_limit_mb,
        };
        ((limit_mb - self.safety_margin_mb).max(0.0) * MB) as u64
    }

    /// Compute the encode budget for one job.
    ///
    /// Duration is clamped to a sane range first, so degenerate inputs can
    /// never divide by zero or demand absurd bitrates. Non-finite values
    /// collapse to the lower clamp.
    pub fn plan(&self, provider: Provider, duration_secs: f64) -> BudgetPlan {
        let duration = if duration_secs.is_finite() {
            duration_secs.clamp(self.min_duration_secs, self.max_duration_secs)
        } else {
            self.min_duration_secs
        };

        let target_bytes = self.target_bytes(provider);

        let total_kbps = target_bytes as f64 * 8.0 * self.overhead_factor / duration / 1000.0;
        let video_kbps = (total_kbps - self.audio_kbps as f64).max(self.min_video_kbps as f64) as u32;

        let max_edge_px = if video_kbps >= self.hd_threshold_kbps {
            self.hd_edge_px
        } else {
            self.sd_edge_px
        };

        BudgetPlan {
            target_bytes,
            video_kbps,
            audio_kbps: self.audio_kbps,
            max_edge_px,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_bytes_per_provider() {
        let config = PlannerConfig::default();

        // 25 - 1.5 = 23.5 MB and so on down the table
        assert_eq!(config.target_bytes(Provider::Gmail), 24_641_536);
        assert_eq!(config.target_bytes(Provider::Outlook), 19_398_656);
        assert_eq!(config.target_bytes(Provider::Other), 14_155_776);
    }

    #[test]
    fn test_short_clip_gets_hd_budget() {
        let config = PlannerConfig::default();
        let plan = config.plan(Provider::Gmail, 45.0);

        // 23.5 MB * 8 * 0.9 over 45s is ~3.9 Mbps of video
        assert_eq!(plan.video_kbps, 3846);
        assert_eq!(plan.max_edge_px, 1280);
        assert_eq!(plan.audio_kbps, 96);
    }

    #[test]
    fn test_long_clip_hits_bitrate_floor() {
        let config = PlannerConfig::default();
        let plan = config.plan(Provider::Gmail, 7200.0);

        assert_eq!(plan.video_kbps, config.min_video_kbps);
        assert_eq!(plan.max_edge_px, config.sd_edge_px);
    }

    #[test]
    fn test_duration_is_clamped() {
        let config = PlannerConfig::default();

        let zero = config.plan(Provider::Other, 0.0);
        let negative = config.plan(Provider::Other, -3.0);
        let tiny = config.plan(Provider::Other, 0.2);
        let floor = config.plan(Provider::Other, config.min_duration_secs);
        assert_eq!(zero, floor);
        assert_eq!(negative, floor);
        assert_eq!(tiny, floor);

        let week = config.plan(Provider::Other, 604_800.0);
        let ceiling = config.plan(Provider::Other, config.max_duration_secs);
        assert_eq!(week, ceiling);
    }

    #[test]
    fn test_non_finite_duration_does_not_poison_plan() {
        let config = PlannerConfig::default();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let plan = config.plan(Provider::Gmail, bad);
            assert_eq!(plan, config.plan(Provider::Gmail, config.min_duration_secs));
            assert!(plan.video_kbps >= config.min_video_kbps);
        }
    }

    #[test]
    fn test_plan_is_deterministic_and_floored() {
        let config = PlannerConfig::default();
        let providers = [Provider::Gmail, Provider::Outlook, Provider::Other];
        let durations = [1.0, 10.0, 45.0, 300.0, 1800.0, 7200.0];

        for provider in providers {
            for duration in durations {
                let a = config.plan(provider, duration);
                let b = config.plan(provider, duration);
                assert_eq!(a, b);
                assert!(a.video_kbps >= config.min_video_kbps);
                assert_eq!(a.target_bytes, config.target_bytes(provider));
                assert!(a.max_edge_px == config.hd_edge_px || a.max_edge_px == config.sd_edge_px);
            }
        }
    }

    #[test]
    fn test_resolution_threshold() {
        let config = PlannerConfig::default();

        // gmail's budget crosses the 800 kbps threshold near 198s; check both sides
        let hd = config.plan(Provider::Gmail, 190.0);
        assert!(hd.video_kbps >= config.hd_threshold_kbps);
        assert_eq!(hd.max_edge_px, 1280);

        let sd = config.plan(Provider::Gmail, 260.0);
        assert!(sd.video_kbps < config.hd_threshold_kbps);
        assert_eq!(sd.max_edge_px, 854);
    }
}
