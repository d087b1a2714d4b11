use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timeline::{secs_between, StatePeriod, TotalsByState};
use crate::timer::SessionRunState;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Everything recorded for one finished (stopped or completed) session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub outcome: SessionRunState,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub periods: Vec<StatePeriod>,
    pub totals: TotalsByState,
}

impl SessionSummary {
    pub fn elapsed_secs(&self) -> f64 {
        secs_between(self.started_at, self.ended_at)
    }

    pub fn render(&self) -> String {
        render(&self.periods, &self.totals, self.started_at, self.ended_at)
    }
}

/// Share of `value` in `total` as a percentage; zero when nothing was recorded.
fn percentage(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total * 100.0
    } else {
        0.0
    }
}

/// Human-readable session report.
///
/// Each percentage is rounded on its own, so the column may not add up to
/// exactly 100.
pub fn render(
    periods: &[StatePeriod],
    totals: &TotalsByState,
    session_start: DateTime<Utc>,
    session_end: DateTime<Utc>,
) -> String {
    let mut lines = vec!["[State changes]".to_string()];
    lines.extend(periods.iter().map(|period| {
        format!(
            "{} / start: {} / end: {} / duration: {:.2}s",
            period.state,
            period.start.format(TIME_FORMAT),
            period.end.format(TIME_FORMAT),
            period.duration_secs
        )
    }));

    lines.push(String::new());
    lines.push("Totals by state (seconds):".to_string());
    let grand_total = totals.total();
    lines.extend(totals.iter().map(|(state, secs)| {
        format!("{}: {:.2}s ({:.1}%)", state, secs, percentage(secs, grand_total))
    }));

    lines.push(String::new());
    lines.push(format!("Session start: {}", session_start.format(TIME_FORMAT)));
    lines.push(format!("Session end: {}", session_end.format(TIME_FORMAT)));
    lines.push(format!(
        "Total elapsed: {:.2}s",
        secs_between(session_start, session_end)
    ));

    lines.join("\n")
}
