pub mod period;
pub mod recorder;

pub use period::{secs_between, StatePeriod, TotalsByState};
pub use recorder::TimelineRecorder;
