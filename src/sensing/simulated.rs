//! Stand-in camera and detector used by the binary when no real capture or
//! inference backend is wired in.

use std::ops::RangeInclusive;

use anyhow::{bail, Result};
use image::Rgb;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::source::{
    BoundingBox, Detector, Frame, FrameSource, RawDetection, PEN_LABEL, PHONE_LABEL,
};

const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;
/// Chance that a writing hand is missed in a single frame.
const PEN_MISS_RATE: f64 = 0.15;

/// Produces synthetic gradient frames while open.
pub struct SimulatedCamera {
    open: bool,
    frame_no: u32,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            open: false,
            frame_no: 0,
        }
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SimulatedCamera {
    fn open(&mut self) -> Result<()> {
        if self.open {
            bail!("simulated camera already open");
        }
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            bail!("simulated camera is not open");
        }
        self.frame_no = self.frame_no.wrapping_add(1);
        let shift = (self.frame_no % 256) as u8;
        let frame = Frame::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
            Rgb([(x as u8).wrapping_add(shift), y as u8, 128])
        });
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.open = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scene {
    Writing,
    OnPhone,
    Away,
}

/// Random walk over "writing", "on the phone" and "away" scenes, each lasting
/// a random number of frames.
pub struct SimulatedDetector {
    rng: StdRng,
    frames_per_scene: RangeInclusive<u32>,
    scene: Scene,
    frames_left: u32,
}

impl SimulatedDetector {
    pub fn new(frames_per_scene: RangeInclusive<u32>) -> Self {
        Self::with_rng(StdRng::from_entropy(), frames_per_scene)
    }

    pub fn seeded(seed: u64, frames_per_scene: RangeInclusive<u32>) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), frames_per_scene)
    }

    fn with_rng(rng: StdRng, frames_per_scene: RangeInclusive<u32>) -> Self {
        Self {
            rng,
            frames_per_scene,
            scene: Scene::Away,
            frames_left: 0,
        }
    }

    fn next_scene(&mut self) {
        let roll: f64 = self.rng.gen();
        self.scene = if roll < 0.6 {
            Scene::Writing
        } else if roll < 0.8 {
            Scene::OnPhone
        } else {
            Scene::Away
        };
        let (lo, hi) = (*self.frames_per_scene.start(), *self.frames_per_scene.end());
        self.frames_left = self.rng.gen_range(lo.max(1)..=hi.max(lo.max(1)));
    }

    fn jittered_box(&mut self, cx: f32, cy: f32, half: f32) -> BoundingBox {
        let dx = self.rng.gen_range(-2.0..2.0);
        let dy = self.rng.gen_range(-2.0..2.0);
        BoundingBox {
            xmin: cx - half + dx,
            ymin: cy - half + dy,
            xmax: cx + half + dx,
            ymax: cy + half + dy,
        }
    }

    fn person(&mut self) -> RawDetection {
        RawDetection::new("person", self.jittered_box(32.0, 20.0, 16.0), 0.9)
    }
}

impl Detector for SimulatedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        if self.frames_left == 0 {
            self.next_scene();
        }
        self.frames_left -= 1;

        let mut detections = Vec::new();
        match self.scene {
            Scene::Writing => {
                detections.push(self.person());
                if !self.rng.gen_bool(PEN_MISS_RATE) {
                    let confidence = self.rng.gen_range(0.45..0.95);
                    detections.push(RawDetection::new(
                        PEN_LABEL,
                        self.jittered_box(40.0, 36.0, 6.0),
                        confidence,
                    ));
                }
            }
            Scene::OnPhone => {
                detections.push(self.person());
                let confidence = self.rng.gen_range(0.5..0.95);
                detections.push(RawDetection::new(
                    PHONE_LABEL,
                    self.jittered_box(24.0, 30.0, 5.0),
                    confidence,
                ));
            }
            Scene::Away => {}
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_only_reads_while_open() {
        let mut camera = SimulatedCamera::new();
        assert!(camera.read().is_err());

        camera.open().unwrap();
        let frame = camera.read().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (FRAME_WIDTH, FRAME_HEIGHT));

        camera.release();
        assert!(camera.read().is_err());
    }

    #[test]
    fn seeded_detector_produces_meaningful_labels() {
        let mut detector = SimulatedDetector::seeded(7, 5..=10);
        let frame = Frame::new(FRAME_WIDTH, FRAME_HEIGHT);

        let mut labels = std::collections::HashSet::new();
        for _ in 0..500 {
            for detection in detector.detect(&frame).unwrap() {
                labels.insert(detection.label);
            }
        }
        assert!(labels.contains(PEN_LABEL));
        assert!(labels.contains(PHONE_LABEL));
    }
}
