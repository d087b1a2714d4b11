use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pen sighting keeps the user "studying" for this long.
pub const PEN_GRACE_SECONDS: f64 = 2.0;
/// A phone sighting keeps the user "playing" for this long.
pub const PHONE_GRACE_SECONDS: f64 = 1.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActivityState {
    Studying,
    Playing,
    Idle,
}

impl ActivityState {
    pub const ALL: [ActivityState; 3] = [
        ActivityState::Studying,
        ActivityState::Playing,
        ActivityState::Idle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityState::Studying => "STUDYING",
            ActivityState::Playing => "PLAYING",
            ActivityState::Idle => "IDLE",
        }
    }
}

impl Default for ActivityState {
    fn default() -> Self {
        ActivityState::Idle
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps the time since the last pen/phone sighting to an activity.
///
/// Both windows are inclusive and the pen window is checked first, so a pen
/// seen within its grace period wins even over a more recent phone sighting.
pub fn classify(
    now: DateTime<Utc>,
    last_pen_seen_at: Option<DateTime<Utc>>,
    last_phone_seen_at: Option<DateTime<Utc>>,
) -> ActivityState {
    if within_grace(now, last_pen_seen_at, PEN_GRACE_SECONDS) {
        ActivityState::Studying
    } else if within_grace(now, last_phone_seen_at, PHONE_GRACE_SECONDS) {
        ActivityState::Playing
    } else {
        ActivityState::Idle
    }
}

fn within_grace(now: DateTime<Utc>, seen_at: Option<DateTime<Utc>>, grace_secs: f64) -> bool {
    let Some(seen_at) = seen_at else {
        return false;
    };
    let grace = Duration::microseconds((grace_secs * 1_000_000.0) as i64);
    now - seen_at <= grace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;

    #[test]
    fn pen_precedence_over_recent_phone() {
        let now = at(10.0);
        let state = classify(now, Some(at(8.1)), Some(at(9.5)));
        assert_eq!(state, ActivityState::Studying);
    }

    #[test]
    fn pen_boundary_is_inclusive() {
        assert_eq!(
            classify(at(10.0), Some(at(8.0)), None),
            ActivityState::Studying
        );
        assert_eq!(
            classify(at(10.000_001), Some(at(8.0)), None),
            ActivityState::Idle
        );
    }

    #[test]
    fn phone_window_applies_after_pen_expires() {
        assert_eq!(
            classify(at(10.0), Some(at(7.0)), Some(at(9.0))),
            ActivityState::Playing
        );
        assert_eq!(
            classify(at(10.0), Some(at(7.0)), Some(at(8.9))),
            ActivityState::Idle
        );
    }

    #[test]
    fn never_seen_is_idle() {
        assert_eq!(classify(at(0.0), None, None), ActivityState::Idle);
    }
}
