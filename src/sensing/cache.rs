use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

use super::source::RawDetection;

/// Run the detector on every frame unless configured otherwise.
pub const DEFAULT_DETECT_EVERY_N_FRAMES: u32 = 1;
/// Cached detections older than this are no longer trusted.
pub const DEFAULT_MAX_STALENESS_MS: i64 = 1_000;

#[derive(Debug, Clone)]
struct CachedDetections {
    detections: Vec<RawDetection>,
    captured_at: DateTime<Utc>,
    frame_index: u64,
}

/// Frame-skipping cache: only every Nth frame goes through the detector and
/// the frames in between reuse the last result. A skipped frame whose cached
/// result is older than `max_staleness` sees no detections.
#[derive(Debug, Clone)]
pub struct DetectionCache {
    every_n_frames: u32,
    max_staleness: Duration,
    frame_index: u64,
    cached: Option<CachedDetections>,
}

impl DetectionCache {
    pub fn new(every_n_frames: u32, max_staleness: Duration) -> Self {
        Self {
            every_n_frames: every_n_frames.max(1),
            max_staleness,
            frame_index: 0,
            cached: None,
        }
    }

    /// Returns detections for the next frame, running `detect` only when this
    /// frame is due for inference.
    ///
    /// A failing detector counts as an empty result for the frame.
    pub fn detections_for_frame<F>(&mut self, now: DateTime<Utc>, detect: F) -> Vec<RawDetection>
    where
        F: FnOnce() -> Result<Vec<RawDetection>>,
    {
        let index = self.frame_index;
        self.frame_index = self.frame_index.wrapping_add(1);

        if index % u64::from(self.every_n_frames) != 0 {
            return match &self.cached {
                Some(cached) if now - cached.captured_at <= self.max_staleness => {
                    log_debug!(
                        "frame {} reusing detections from frame {}",
                        index,
                        cached.frame_index
                    );
                    cached.detections.clone()
                }
                _ => Vec::new(),
            };
        }

        let detections = match detect() {
            Ok(detections) => detections,
            Err(err) => {
                log_warn!("detector failed on frame {}: {err:?}", index);
                Vec::new()
            }
        };

        self.cached = Some(CachedDetections {
            detections: detections.clone(),
            captured_at: now,
            frame_index: index,
        });
        detections
    }

    pub fn reset(&mut self) {
        self.frame_index = 0;
        self.cached = None;
    }
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new(
            DEFAULT_DETECT_EVERY_N_FRAMES,
            Duration::milliseconds(DEFAULT_MAX_STALENESS_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, detection};
    use anyhow::bail;

    #[test]
    fn skipped_frames_reuse_last_result() {
        let mut cache = DetectionCache::new(3, Duration::seconds(1));
        let mut calls = 0;

        for i in 0..6 {
            let detections = cache.detections_for_frame(at(i as f64 * 0.1), || {
                calls += 1;
                Ok(vec![detection("hand_with_pen")])
            });
            assert_eq!(detections.len(), 1);
        }
        assert_eq!(calls, 2);
    }

    #[test]
    fn stale_cache_yields_no_detections_without_running_detector() {
        let mut cache = DetectionCache::new(5, Duration::milliseconds(200));
        cache.detections_for_frame(at(0.0), || Ok(vec![detection("smartphone")]));

        let mut called = false;
        let detections = cache.detections_for_frame(at(0.5), || {
            called = true;
            Ok(vec![detection("smartphone")])
        });
        assert!(!called);
        assert!(detections.is_empty());
    }

    #[test]
    fn detector_failure_counts_as_no_detections() {
        let mut cache = DetectionCache::default();
        let detections = cache.detections_for_frame(at(0.0), || bail!("model crashed"));
        assert!(detections.is_empty());
    }

    #[test]
    fn reset_drops_cached_result() {
        let mut cache = DetectionCache::new(4, Duration::seconds(10));
        cache.detections_for_frame(at(0.0), || Ok(vec![detection("hand_with_pen")]));
        cache.detections_for_frame(at(0.1), || Ok(Vec::new()));
        cache.reset();

        let mut called = false;
        let detections = cache.detections_for_frame(at(1.0), || {
            called = true;
            Ok(Vec::new())
        });
        assert!(called);
        assert!(detections.is_empty());
    }
}
