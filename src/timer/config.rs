use anyhow::{bail, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::sensing::{
    DEFAULT_DETECT_EVERY_N_FRAMES, DEFAULT_MAX_STALENESS_MS, DEFAULT_MIN_CONFIDENCE,
};

use super::state::DetectionMode;

/// Upper bound for every millisecond setting (one day).
pub const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1_000;

/// Everything a session needs to know up front. Validated before a session
/// can be created; never changed while one is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub focus_secs: u64,
    pub break_secs: u64,
    pub total_sets: u32,
    pub mode: DetectionMode,
    /// Run the detector on one frame out of every N; the rest reuse its result.
    pub detect_every_n_frames: u32,
    pub max_staleness_ms: u64,
    pub min_confidence: f32,
    /// Tick cadence of the session loop (one frame per tick).
    pub frame_interval_ms: u64,
    /// How often the activity state is sampled into the timeline.
    pub sample_interval_ms: u64,
    /// Consecutive frame failures before the device is reported as failing.
    pub device_failure_threshold: u32,
    pub heartbeat_every_ticks: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            focus_secs: 25 * 60,
            break_secs: 5 * 60,
            total_sets: 1,
            mode: DetectionMode::Default,
            detect_every_n_frames: DEFAULT_DETECT_EVERY_N_FRAMES,
            max_staleness_ms: DEFAULT_MAX_STALENESS_MS as u64,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            frame_interval_ms: 100,
            sample_interval_ms: 1_000,
            device_failure_threshold: 3,
            heartbeat_every_ticks: 10,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.focus_secs == 0 {
            bail!("focus duration must be greater than zero");
        }
        if self.break_secs == 0 {
            bail!("break duration must be greater than zero");
        }
        if self.total_sets == 0 {
            bail!("number of sets must be at least one");
        }
        if self.detect_every_n_frames == 0 {
            bail!("detect_every_n_frames must be at least one");
        }
        if self.frame_interval_ms == 0 {
            bail!("frame interval must be greater than zero");
        }
        if self.sample_interval_ms == 0 {
            bail!("sample interval must be greater than zero");
        }
        if self.device_failure_threshold == 0 {
            bail!("device failure threshold must be at least one");
        }
        if self.heartbeat_every_ticks == 0 {
            bail!("heartbeat interval must be at least one tick");
        }
        for (name, value) in [
            ("frame interval", self.frame_interval_ms),
            ("sample interval", self.sample_interval_ms),
            ("max staleness", self.max_staleness_ms),
        ] {
            if value > MAX_INTERVAL_MS {
                bail!("{name} of {value}ms exceeds the {MAX_INTERVAL_MS}ms limit");
            }
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            bail!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            );
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::milliseconds(self.sample_interval_ms.min(MAX_INTERVAL_MS) as i64)
    }

    pub fn max_staleness(&self) -> Duration {
        Duration::milliseconds(self.max_staleness_ms.min(MAX_INTERVAL_MS) as i64)
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let config = SessionConfig {
            focus_secs: 0,
            ..SessionConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("focus duration"));

        let config = SessionConfig {
            break_secs: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            total_sets: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn confidence_out_of_range_is_rejected() {
        let config = SessionConfig {
            min_confidence: 1.5,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_intervals_are_rejected() {
        let config = SessionConfig {
            max_staleness_ms: 1 << 63,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            sample_interval_ms: u64::MAX,
            ..SessionConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sample interval"));
        assert!(config.sample_interval() > Duration::zero());

        let config = SessionConfig {
            frame_interval_ms: MAX_INTERVAL_MS + 1,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"focusSecs": 60, "mode": "penGated"}"#).unwrap();
        assert_eq!(config.focus_secs, 60);
        assert_eq!(config.mode, DetectionMode::PenGated);
        assert_eq!(config.break_secs, 300);
    }
}
