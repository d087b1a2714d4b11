pub mod alert_gate;
pub mod commands;
pub mod config;
pub mod controller;
pub mod events;
pub mod session;
pub mod state;


pub use config::SessionConfig;
pub use controller::SessionController;
pub use events::SessionEvent;
pub use session::{Session, SessionSnapshot};
pub use state::{CycleKind, DetectionMode, DeviceStatus, SessionCycle, SessionRunState};
