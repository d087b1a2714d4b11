use chrono::{DateTime, Utc};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

use crate::activity::ActivityState;

use super::period::{StatePeriod, TotalsByState};

#[derive(Debug, Clone, Copy)]
struct OpenPeriod {
    state: ActivityState,
    start: DateTime<Utc>,
}

/// Builds the session's activity timeline from periodic samples.
///
/// Closed periods are append-only and contiguous: each starts where the
/// previous one ended. At most one period is open at a time.
#[derive(Debug, Clone, Default)]
pub struct TimelineRecorder {
    periods: Vec<StatePeriod>,
    totals: TotalsByState,
    open: Option<OpenPeriod>,
    started_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
}

impl TimelineRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything and opens the first period at `now`.
    pub fn begin(&mut self, now: DateTime<Utc>, state: ActivityState) {
        *self = Self {
            periods: Vec::new(),
            totals: TotalsByState::default(),
            open: Some(OpenPeriod { state, start: now }),
            started_at: Some(now),
            closed_at: None,
        };
    }

    /// Records the classified state at `now`. Returns the period closed by a
    /// state change, if any.
    pub fn sample(&mut self, now: DateTime<Utc>, state: ActivityState) -> Option<StatePeriod> {
        let open = self.open?;
        if open.state == state {
            return None;
        }

        let end = now.max(open.start);
        if end == open.start {
            // Nothing elapsed yet; relabel rather than emit an empty period.
            self.open = Some(OpenPeriod { state, start: end });
            return None;
        }

        let closed = self.close(open, end);
        self.open = Some(OpenPeriod { state, start: end });
        log_debug!("activity {} -> {} at {}", closed.state, state, end);
        Some(closed)
    }

    /// Closes the open period. Calling it again, or with no open period, does
    /// nothing.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<StatePeriod> {
        let open = self.open.take()?;
        let end = now.max(open.start);
        let closed = self.close(open, end);
        self.closed_at = Some(end);
        Some(closed)
    }

    /// Re-opens a finalized timeline. Time spent closed is accounted as idle so
    /// the timeline stays contiguous.
    pub fn reopen(&mut self, now: DateTime<Utc>, state: ActivityState) {
        if self.open.is_some() {
            log_warn!("reopen requested while a period is still open");
            return;
        }
        let Some(closed_at) = self.closed_at.take() else {
            self.begin(now, state);
            return;
        };

        let start = now.max(closed_at);
        if start > closed_at {
            self.close(
                OpenPeriod {
                    state: ActivityState::Idle,
                    start: closed_at,
                },
                start,
            );
        }
        self.open = Some(OpenPeriod { state, start });
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn close(&mut self, open: OpenPeriod, end: DateTime<Utc>) -> StatePeriod {
        let period = StatePeriod::new(open.state, open.start, end);
        self.totals.add(period.state, period.duration_secs);
        self.periods.push(period.clone());
        period
    }

    pub fn periods(&self) -> &[StatePeriod] {
        &self.periods
    }

    pub fn totals(&self) -> TotalsByState {
        self.totals
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}
