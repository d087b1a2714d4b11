use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::source::{RawDetection, PEN_LABEL, PHONE_LABEL};

/// Minimum detector confidence for a box to count.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DetectionSignal {
    Pen,
    Phone,
    None,
}

impl Default for DetectionSignal {
    fn default() -> Self {
        DetectionSignal::None
    }
}

/// Per-frame summary of what the detector saw.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    pub signal: DetectionSignal,
    pub pen_seen: bool,
    pub phone_seen: bool,
    pub at: DateTime<Utc>,
}

/// Turns raw detector output into [`SignalEvent`]s and remembers when each
/// meaningful label was last in view.
#[derive(Debug, Clone)]
pub struct SignalTracker {
    min_confidence: f32,
    last_pen_seen_at: Option<DateTime<Utc>>,
    last_phone_seen_at: Option<DateTime<Utc>>,
    latest: Option<SignalEvent>,
}

impl SignalTracker {
    pub fn new(min_confidence: f32) -> Self {
        Self {
            min_confidence,
            last_pen_seen_at: None,
            last_phone_seen_at: None,
            latest: None,
        }
    }

    pub fn adapt(&mut self, detections: &[RawDetection], now: DateTime<Utc>) -> SignalEvent {
        let pen_seen = contains_label(detections, PEN_LABEL, self.min_confidence);
        let phone_seen = contains_label(detections, PHONE_LABEL, self.min_confidence);

        if pen_seen {
            self.last_pen_seen_at = Some(now);
        }
        if phone_seen {
            self.last_phone_seen_at = Some(now);
        }

        // Pen wins when both are in the same frame.
        let signal = if pen_seen {
            DetectionSignal::Pen
        } else if phone_seen {
            DetectionSignal::Phone
        } else {
            DetectionSignal::None
        };

        let event = SignalEvent {
            signal,
            pen_seen,
            phone_seen,
            at: now,
        };
        self.latest = Some(event);
        event
    }

    pub fn last_pen_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_pen_seen_at
    }

    pub fn last_phone_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_phone_seen_at
    }

    /// Most recent frame summary, if any frame was adapted since the last reset.
    pub fn latest(&self) -> Option<SignalEvent> {
        self.latest
    }

    pub fn reset(&mut self) {
        self.last_pen_seen_at = None;
        self.last_phone_seen_at = None;
        self.latest = None;
    }
}

impl Default for SignalTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

fn contains_label(detections: &[RawDetection], label: &str, min_confidence: f32) -> bool {
    detections
        .iter()
        .any(|d| d.label == label && d.confidence >= min_confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, detection};

    #[test]
    fn pen_takes_priority_over_phone() {
        let mut tracker = SignalTracker::default();
        let event = tracker.adapt(&[detection(PHONE_LABEL), detection(PEN_LABEL)], at(1.0));

        assert_eq!(event.signal, DetectionSignal::Pen);
        assert!(event.pen_seen && event.phone_seen);
        assert_eq!(tracker.last_pen_seen_at(), Some(at(1.0)));
        assert_eq!(tracker.last_phone_seen_at(), Some(at(1.0)));
    }

    #[test]
    fn phone_alone_yields_phone_signal() {
        let mut tracker = SignalTracker::default();
        let event = tracker.adapt(
            &[detection(PHONE_LABEL), detection(PHONE_LABEL), detection("cup")],
            at(2.0),
        );

        assert_eq!(event.signal, DetectionSignal::Phone);
        assert_eq!(tracker.last_pen_seen_at(), None);
    }

    #[test]
    fn unrelated_labels_yield_none_and_keep_timestamps() {
        let mut tracker = SignalTracker::default();
        tracker.adapt(&[detection(PEN_LABEL)], at(1.0));
        let event = tracker.adapt(&[detection("book"), detection("person")], at(3.0));

        assert_eq!(event.signal, DetectionSignal::None);
        assert_eq!(tracker.last_pen_seen_at(), Some(at(1.0)));
        assert_eq!(tracker.latest().map(|e| e.at), Some(at(3.0)));
    }

    #[test]
    fn low_confidence_boxes_are_ignored() {
        let mut tracker = SignalTracker::new(0.5);
        let mut weak = detection(PEN_LABEL);
        weak.confidence = 0.3;

        let event = tracker.adapt(&[weak], at(1.0));
        assert_eq!(event.signal, DetectionSignal::None);
        assert_eq!(tracker.last_pen_seen_at(), None);
    }
}
