use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use anyhow::bail;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionRunState {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

impl Default for SessionRunState {
    fn default() -> Self {
        SessionRunState::Idle
    }
}

impl SessionRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionRunState::Idle => "idle",
            SessionRunState::Running => "running",
            SessionRunState::Paused => "paused",
            SessionRunState::Stopped => "stopped",
            SessionRunState::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CycleKind {
    Focus,
    Break,
}

impl Default for CycleKind {
    fn default() -> Self {
        CycleKind::Focus
    }
}

/// How live detections influence the focus countdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DetectionMode {
    /// Countdown runs regardless of what the camera sees.
    Default,
    /// Countdown holds while a phone is the current signal.
    PhoneFreezes,
    /// Countdown only runs while a pen is the current signal.
    PenGated,
    /// Countdown runs; phone sightings raise a rate-limited alert.
    PhoneAlerts,
}

impl Default for DetectionMode {
    fn default() -> Self {
        DetectionMode::Default
    }
}

impl FromStr for DetectionMode {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> anyhow::Result<Self> {
        match input.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "default" | "plain" => Ok(DetectionMode::Default),
            "phone-freezes" | "freeze" => Ok(DetectionMode::PhoneFreezes),
            "pen-gated" | "pen" => Ok(DetectionMode::PenGated),
            "phone-alerts" | "alert" | "alerts" => Ok(DetectionMode::PhoneAlerts),
            other => bail!(
                "unknown mode '{other}' (default, phone-freezes, pen-gated, phone-alerts)"
            ),
        }
    }
}

/// Position within the focus/break plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionCycle {
    pub set_index: u32,
    pub cycle_kind: CycleKind,
    pub time_remaining_secs: u64,
}

impl SessionCycle {
    pub fn first_focus(focus_secs: u64) -> Self {
        Self {
            set_index: 1,
            cycle_kind: CycleKind::Focus,
            time_remaining_secs: focus_secs,
        }
    }
}

impl Default for SessionCycle {
    fn default() -> Self {
        Self::first_focus(0)
    }
}

/// Camera health as seen by the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum DeviceStatus {
    /// Not held; no detection needed right now.
    Released,
    Streaming,
    Unavailable { reason: String },
    Failing { consecutive_failures: u32, reason: String },
}

impl Default for DeviceStatus {
    fn default() -> Self {
        DeviceStatus::Released
    }
}

/// Whole-second countdown driven by wall-clock ticks.
///
/// Sub-second remainders carry over between ticks; the anchor is cleared
/// while the countdown is not running so paused time never counts.
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    anchor: Option<DateTime<Utc>>,
    carry_ms: i64,
}

impl Countdown {
    pub fn run_from(&mut self, now: DateTime<Utc>) {
        self.anchor = Some(now);
    }

    pub fn halt(&mut self) {
        self.anchor = None;
        self.carry_ms = 0;
    }

    /// Moves the anchor to `now` and returns how many whole seconds elapsed,
    /// keeping the fractional remainder for the next call.
    pub fn take_whole_seconds(&mut self, now: DateTime<Utc>) -> u64 {
        let Some(anchor) = self.anchor else {
            self.anchor = Some(now);
            return 0;
        };
        let elapsed_ms = (now - anchor).num_milliseconds().max(0);
        self.anchor = Some(now);
        self.carry_ms += elapsed_ms;

        let whole = self.carry_ms / 1_000;
        self.carry_ms -= whole * 1_000;
        whole as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;

    #[test]
    fn countdown_carries_fractional_seconds() {
        let mut countdown = Countdown::default();
        countdown.run_from(at(0.0));

        assert_eq!(countdown.take_whole_seconds(at(0.6)), 0);
        assert_eq!(countdown.take_whole_seconds(at(1.2)), 1);
        assert_eq!(countdown.take_whole_seconds(at(3.9)), 2);
    }

    #[test]
    fn halted_countdown_ignores_elapsed_time() {
        let mut countdown = Countdown::default();
        countdown.run_from(at(0.0));
        countdown.take_whole_seconds(at(0.9));
        countdown.halt();

        assert_eq!(countdown.take_whole_seconds(at(50.0)), 0);
        assert_eq!(countdown.take_whole_seconds(at(51.0)), 1);
    }

    #[test]
    fn modes_parse_from_long_and_short_names() {
        assert_eq!("pen".parse::<DetectionMode>().unwrap(), DetectionMode::PenGated);
        assert_eq!(
            "Phone_Freezes".parse::<DetectionMode>().unwrap(),
            DetectionMode::PhoneFreezes
        );
        assert_eq!(
            "phone-alerts".parse::<DetectionMode>().unwrap(),
            DetectionMode::PhoneAlerts
        );
        assert!("strict".parse::<DetectionMode>().is_err());
    }
}
