use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// A single captured camera frame.
pub type Frame = RgbImage;

/// Label the detector assigns to a hand holding a pen.
pub const PEN_LABEL: &str = "hand_with_pen";
/// Label the detector assigns to a smartphone.
pub const PHONE_LABEL: &str = "smartphone";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

/// One object reported by the detector for a frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    pub label: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            label: label.into(),
            bbox,
            confidence,
        }
    }
}

/// Object detector backend. Only label identity matters to the session core;
/// boxes and confidences are carried through for drawing.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;
}

/// Camera-like frame producer.
///
/// `read` returns `Ok(None)` at end-of-stream. `release` must tolerate being
/// called on a source that is not open.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<()>;
    fn read(&mut self) -> Result<Option<Frame>>;
    fn release(&mut self);
}

/// Exclusive hold on a [`FrameSource`].
///
/// Tracks whether the device is currently acquired so every acquisition is
/// released exactly once, including when the lease itself is dropped.
pub struct CameraLease {
    source: Box<dyn FrameSource>,
    held: bool,
}

impl CameraLease {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            held: false,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Opens the device unless it is already held.
    pub fn acquire(&mut self) -> Result<()> {
        if self.held {
            return Ok(());
        }
        self.source.open()?;
        self.held = true;
        log_info!("camera acquired");
        Ok(())
    }

    /// Releases the device if held; a no-op otherwise.
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.source.release();
        self.held = false;
        log_info!("camera released");
    }

    pub fn read(&mut self) -> Result<Option<Frame>> {
        if !self.held {
            log_warn!("frame requested from a camera that is not held");
            return Ok(None);
        }
        self.source.read()
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}
