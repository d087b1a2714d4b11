use chrono::{DateTime, Duration, Utc};

/// Minimum spacing between two phone warnings.
pub const PHONE_ALERT_COOLDOWN_SECS: i64 = 5;

/// Rate limiter for fire-and-forget alerts.
#[derive(Debug, Clone)]
pub struct AlertGate {
    cooldown: Duration,
    last_fired: Option<DateTime<Utc>>,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: None,
        }
    }

    /// Returns true and arms the cooldown when an alert may fire at `now`.
    pub fn try_fire(&mut self, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_fired {
            if now - last < self.cooldown {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

impl Default for AlertGate {
    fn default() -> Self {
        Self::new(Duration::seconds(PHONE_ALERT_COOLDOWN_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;

    #[test]
    fn fires_at_most_once_per_cooldown() {
        let mut gate = AlertGate::default();
        assert!(gate.try_fire(at(0.0)));
        assert!(!gate.try_fire(at(1.0)));
        assert!(!gate.try_fire(at(4.99)));
        assert!(gate.try_fire(at(5.0)));
        assert!(!gate.try_fire(at(9.0)));
    }

    #[test]
    fn reset_rearms_immediately() {
        let mut gate = AlertGate::default();
        gate.try_fire(at(0.0));
        gate.reset();
        assert!(gate.try_fire(at(0.5)));
    }
}
