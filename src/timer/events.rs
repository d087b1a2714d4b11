use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::activity::ActivityState;
use crate::report::SessionSummary;

use super::state::{DeviceStatus, SessionCycle, SessionRunState};

/// Notifications the session core publishes for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum SessionEvent {
    RunStateChanged {
        run_state: SessionRunState,
        at: DateTime<Utc>,
    },
    ActivityChanged {
        from: ActivityState,
        to: ActivityState,
        at: DateTime<Utc>,
    },
    CycleChanged {
        cycle: SessionCycle,
        at: DateTime<Utc>,
    },
    PhoneAlert {
        at: DateTime<Utc>,
    },
    DeviceStatus {
        status: DeviceStatus,
        at: DateTime<Utc>,
    },
    Heartbeat {
        cycle: SessionCycle,
        activity: ActivityState,
        at: DateTime<Utc>,
    },
    /// Emitted on stop and on completion.
    Finished {
        summary: SessionSummary,
    },
}
