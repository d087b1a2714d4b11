pub mod adapter;
pub mod cache;
pub mod simulated;
pub mod source;

pub use adapter::{DetectionSignal, SignalEvent, SignalTracker, DEFAULT_MIN_CONFIDENCE};
pub use cache::{DetectionCache, DEFAULT_DETECT_EVERY_N_FRAMES, DEFAULT_MAX_STALENESS_MS};
pub use simulated::{SimulatedCamera, SimulatedDetector};
pub use source::{
    BoundingBox, CameraLease, Detector, Frame, FrameSource, RawDetection, PEN_LABEL, PHONE_LABEL,
};
