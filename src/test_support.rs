//! Fakes shared by the unit tests: a camera that counts acquisitions and a
//! detector whose field of view is scripted by the test.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::sensing::{BoundingBox, Detector, Frame, FrameSource, RawDetection};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

pub fn at(secs: f64) -> DateTime<Utc> {
    t0() + Duration::microseconds((secs * 1_000_000.0).round() as i64)
}

pub fn detection(label: &str) -> RawDetection {
    RawDetection::new(
        label,
        BoundingBox {
            xmin: 10.0,
            ymin: 10.0,
            xmax: 60.0,
            ymax: 80.0,
        },
        0.9,
    )
}

#[derive(Clone, Default)]
pub struct CameraCounters {
    opens: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    failing_reads: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl CameraCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.opens() > self.releases()
    }
}

pub struct FakeCamera {
    counters: CameraCounters,
    open: bool,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            counters: CameraCounters::default(),
            open: false,
        }
    }

    pub fn unavailable() -> Self {
        let camera = Self::new();
        camera.counters.set_unavailable(true);
        camera
    }

    pub fn counters(&self) -> CameraCounters {
        self.counters.clone()
    }
}

impl FrameSource for FakeCamera {
    fn open(&mut self) -> Result<()> {
        if self.counters.unavailable.load(Ordering::SeqCst) {
            bail!("camera busy");
        }
        if self.open {
            bail!("camera opened twice");
        }
        self.open = true;
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if !self.open {
            bail!("camera not open");
        }
        if self.counters.failing_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("read timed out"));
        }
        Ok(Some(Frame::new(4, 4)))
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// What the fake detector "sees" in every frame until changed.
#[derive(Clone, Default)]
pub struct Scene {
    labels: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl Scene {
    pub fn show(&self, labels: &[&str]) {
        *self.labels.lock().unwrap() = labels.iter().map(|l| l.to_string()).collect();
    }

    pub fn clear(&self) {
        self.labels.lock().unwrap().clear();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct FakeDetector {
    scene: Scene,
}

impl FakeDetector {
    pub fn new() -> Self {
        Self {
            scene: Scene::default(),
        }
    }

    pub fn scene(&self) -> Scene {
        self.scene.clone()
    }
}

impl Detector for FakeDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        self.scene.calls.fetch_add(1, Ordering::SeqCst);
        if self.scene.failing.load(Ordering::SeqCst) {
            bail!("inference backend crashed");
        }
        let labels = self.scene.labels.lock().unwrap().clone();
        Ok(labels.iter().map(|label| detection(label)).collect())
    }
}
