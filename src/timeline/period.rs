use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityState;

/// Seconds between two instants at microsecond resolution.
pub fn secs_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start)
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| (end - start).num_milliseconds() as f64 / 1_000.0)
}

/// One closed interval during which the classified activity did not change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatePeriod {
    pub state: ActivityState,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_secs: f64,
}

impl StatePeriod {
    pub fn new(state: ActivityState, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            state,
            start,
            end,
            duration_secs: secs_between(start, end),
        }
    }
}

/// Accumulated seconds per activity state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TotalsByState {
    pub studying: f64,
    pub playing: f64,
    pub idle: f64,
}

impl TotalsByState {
    pub fn get(&self, state: ActivityState) -> f64 {
        match state {
            ActivityState::Studying => self.studying,
            ActivityState::Playing => self.playing,
            ActivityState::Idle => self.idle,
        }
    }

    pub fn add(&mut self, state: ActivityState, secs: f64) {
        let slot = match state {
            ActivityState::Studying => &mut self.studying,
            ActivityState::Playing => &mut self.playing,
            ActivityState::Idle => &mut self.idle,
        };
        *slot += secs.max(0.0);
    }

    pub fn total(&self) -> f64 {
        self.studying + self.playing + self.idle
    }

    /// Entries in display order.
    pub fn iter(&self) -> impl Iterator<Item = (ActivityState, f64)> + '_ {
        ActivityState::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}
