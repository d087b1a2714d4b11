use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    activity::{classify, ActivityState},
    report::SessionSummary,
    sensing::{
        CameraLease, DetectionCache, DetectionSignal, Detector, Frame, FrameSource, RawDetection,
        SignalTracker,
    },
    timeline::{TimelineRecorder, TotalsByState},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

use super::{
    alert_gate::AlertGate,
    config::SessionConfig,
    events::SessionEvent,
    state::{Countdown, CycleKind, DetectionMode, DeviceStatus, SessionCycle, SessionRunState},
};

/// Read-only view of a session for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub run_state: SessionRunState,
    pub cycle: SessionCycle,
    pub total_sets: u32,
    pub mode: DetectionMode,
    pub activity: ActivityState,
    pub device: DeviceStatus,
    pub totals: TotalsByState,
    pub latest_detections: Vec<RawDetection>,
    #[serde(skip)]
    pub latest_frame: Option<Arc<Frame>>,
}

/// One focus session: the focus/break cycle plan, the camera it owns while
/// focusing, and the activity timeline it records.
///
/// Every method takes the current time so the whole state machine can be
/// driven by a real clock or by a simulated one.
pub struct Session {
    config: SessionConfig,
    session_id: Option<String>,
    run_state: SessionRunState,
    cycle: SessionCycle,
    countdown: Countdown,
    camera: CameraLease,
    detector: Box<dyn Detector>,
    cache: DetectionCache,
    tracker: SignalTracker,
    recorder: TimelineRecorder,
    alert_gate: AlertGate,
    activity: ActivityState,
    last_sample_at: Option<DateTime<Utc>>,
    device: DeviceStatus,
    consecutive_failures: u32,
    latest_frame: Option<Arc<Frame>>,
    latest_detections: Vec<RawDetection>,
    ticks: u64,
    summary: Option<SessionSummary>,
    outbox: Vec<SessionEvent>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache: DetectionCache::new(config.detect_every_n_frames, config.max_staleness()),
            tracker: SignalTracker::new(config.min_confidence),
            config,
            session_id: None,
            run_state: SessionRunState::Idle,
            cycle: SessionCycle::default(),
            countdown: Countdown::default(),
            camera: CameraLease::new(source),
            detector,
            recorder: TimelineRecorder::new(),
            alert_gate: AlertGate::default(),
            activity: ActivityState::Idle,
            last_sample_at: None,
            device: DeviceStatus::Released,
            consecutive_failures: 0,
            latest_frame: None,
            latest_detections: Vec::new(),
            ticks: 0,
            summary: None,
            outbox: Vec::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replaces the configuration. Only allowed while idle.
    pub fn configure(&mut self, config: SessionConfig) -> Result<()> {
        if self.run_state != SessionRunState::Idle {
            bail!("cannot reconfigure a {} session; reset it first", self.run_state);
        }
        config.validate()?;
        self.cache = DetectionCache::new(config.detect_every_n_frames, config.max_staleness());
        self.tracker = SignalTracker::new(config.min_confidence);
        self.config = config;
        Ok(())
    }

    pub fn run_state(&self) -> SessionRunState {
        self.run_state
    }

    pub fn cycle(&self) -> SessionCycle {
        self.cycle
    }

    pub fn activity(&self) -> ActivityState {
        self.activity
    }

    pub fn device(&self) -> &DeviceStatus {
        &self.device
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn timeline(&self) -> &TimelineRecorder {
        &self.recorder
    }

    /// Available once the session is stopped or completed.
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn camera_held(&self) -> bool {
        self.camera.is_held()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            run_state: self.run_state,
            cycle: self.cycle,
            total_sets: self.config.total_sets,
            mode: self.config.mode,
            activity: self.activity,
            device: self.device.clone(),
            totals: self.recorder.totals(),
            latest_detections: self.latest_detections.clone(),
            latest_frame: self.latest_frame.clone(),
        }
    }

    /// Hands over the events queued since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.run_state {
            SessionRunState::Running | SessionRunState::Paused => {
                log_warn!(
                    "start ignored: session {} is already {}",
                    self.session_id.as_deref().unwrap_or("?"),
                    self.run_state
                );
                return Ok(());
            }
            SessionRunState::Stopped | SessionRunState::Completed => self.reset(now),
            SessionRunState::Idle => {}
        }

        if let Err(err) = self.camera.acquire() {
            self.set_device(
                now,
                DeviceStatus::Unavailable {
                    reason: format!("{err:#}"),
                },
            );
            return Err(err.context("camera unavailable; session not started"));
        }
        self.set_device(now, DeviceStatus::Streaming);

        let session_id = Uuid::new_v4().to_string();
        log_info!(
            "session {} started: {} set(s) of {}s focus / {}s break, mode {:?}",
            session_id,
            self.config.total_sets,
            self.config.focus_secs,
            self.config.break_secs,
            self.config.mode
        );

        self.session_id = Some(session_id);
        self.cycle = SessionCycle::first_focus(self.config.focus_secs);
        self.countdown.halt();
        self.countdown.run_from(now);
        self.cache.reset();
        self.tracker.reset();
        self.alert_gate.reset();
        self.recorder.begin(now, ActivityState::Idle);
        self.activity = ActivityState::Idle;
        self.last_sample_at = None;
        self.consecutive_failures = 0;
        self.ticks = 0;
        self.summary = None;

        self.set_run_state(now, SessionRunState::Running);
        self.emit(SessionEvent::CycleChanged {
            cycle: self.cycle,
            at: now,
        });
        Ok(())
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.run_state != SessionRunState::Running {
            bail!("cannot pause a {} session", self.run_state);
        }
        self.release_camera(now);
        self.countdown.halt();
        // Nothing is observed while paused.
        self.record_activity(now, ActivityState::Idle);
        self.last_sample_at = None;
        self.set_run_state(now, SessionRunState::Paused);
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.run_state != SessionRunState::Paused {
            bail!("cannot resume a {} session", self.run_state);
        }
        if self.cycle.cycle_kind == CycleKind::Focus && self.cycle.time_remaining_secs > 0 {
            self.acquire_camera(now);
        }
        self.countdown.run_from(now);
        self.last_sample_at = None;
        self.set_run_state(now, SessionRunState::Running);
        Ok(())
    }

    /// Ends the session early. The remaining time is kept for [`Session::restart`].
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !matches!(
            self.run_state,
            SessionRunState::Running | SessionRunState::Paused
        ) {
            bail!("cannot stop a {} session", self.run_state);
        }
        self.finish(now, SessionRunState::Stopped);
        Ok(())
    }

    /// Continues a stopped session from where it left off, keeping its totals.
    pub fn restart(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.run_state != SessionRunState::Stopped {
            bail!("cannot restart a {} session", self.run_state);
        }
        self.recorder.reopen(now, ActivityState::Idle);
        self.activity = ActivityState::Idle;
        if self.cycle.cycle_kind == CycleKind::Focus {
            self.acquire_camera(now);
        }
        self.summary = None;
        self.countdown.run_from(now);
        self.last_sample_at = None;
        self.set_run_state(now, SessionRunState::Running);
        Ok(())
    }

    /// Drops everything back to idle without starting again.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.release_camera(now);
        self.countdown.halt();
        self.cycle = SessionCycle::default();
        self.recorder.clear();
        self.cache.reset();
        self.tracker.reset();
        self.alert_gate.reset();
        self.session_id = None;
        self.activity = ActivityState::Idle;
        self.last_sample_at = None;
        self.consecutive_failures = 0;
        self.latest_frame = None;
        self.latest_detections.clear();
        self.summary = None;
        self.ticks = 0;
        if self.run_state != SessionRunState::Idle {
            self.set_run_state(now, SessionRunState::Idle);
        }
    }

    /// Advances the session by one loop iteration: countdown, one frame of
    /// detection, and an activity sample when one is due. A no-op unless
    /// running.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if self.run_state != SessionRunState::Running {
            return;
        }
        self.ticks = self.ticks.wrapping_add(1);

        self.advance_countdown(now);
        if self.run_state != SessionRunState::Running {
            return;
        }

        if self.process_frame(now) {
            self.sample_if_due(now);
        }

        if self.ticks % u64::from(self.config.heartbeat_every_ticks) == 0 {
            self.emit(SessionEvent::Heartbeat {
                cycle: self.cycle,
                activity: self.activity,
                at: now,
            });
        }
    }

    fn advance_countdown(&mut self, now: DateTime<Utc>) {
        let seconds = self.countdown.take_whole_seconds(now);
        for _ in 0..seconds {
            if self.run_state != SessionRunState::Running {
                break;
            }
            if !self.countdown_allowed() {
                continue;
            }
            self.cycle.time_remaining_secs = self.cycle.time_remaining_secs.saturating_sub(1);
            if self.cycle.time_remaining_secs == 0 {
                self.finish_cycle(now);
            }
        }
    }

    fn countdown_allowed(&self) -> bool {
        if self.cycle.cycle_kind == CycleKind::Break || !self.camera.is_held() {
            return true;
        }
        let signal = self
            .tracker
            .latest()
            .map(|event| event.signal)
            .unwrap_or(DetectionSignal::None);
        match self.config.mode {
            DetectionMode::Default | DetectionMode::PhoneAlerts => true,
            DetectionMode::PhoneFreezes => signal != DetectionSignal::Phone,
            DetectionMode::PenGated => signal == DetectionSignal::Pen,
        }
    }

    fn finish_cycle(&mut self, now: DateTime<Utc>) {
        match self.cycle.cycle_kind {
            CycleKind::Focus => {
                self.release_camera(now);
                self.cycle.cycle_kind = CycleKind::Break;
                self.cycle.time_remaining_secs = self.config.break_secs;
                log_info!("set {} focus finished; break begins", self.cycle.set_index);
                // No detection runs during a break.
                self.record_activity(now, ActivityState::Idle);
                self.last_sample_at = Some(now);
                self.emit(SessionEvent::CycleChanged {
                    cycle: self.cycle,
                    at: now,
                });
            }
            CycleKind::Break => {
                if self.cycle.set_index >= self.config.total_sets {
                    log_info!("final break finished after set {}", self.cycle.set_index);
                    self.finish(now, SessionRunState::Completed);
                    return;
                }
                self.cycle.set_index += 1;
                self.cycle.cycle_kind = CycleKind::Focus;
                self.cycle.time_remaining_secs = self.config.focus_secs;
                log_info!("set {} focus begins", self.cycle.set_index);
                self.acquire_camera(now);
                self.last_sample_at = None;
                self.emit(SessionEvent::CycleChanged {
                    cycle: self.cycle,
                    at: now,
                });
            }
        }
    }

    /// Reads and analyses one frame. Returns false when no frame could be
    /// read, in which case the activity is left as it was.
    fn process_frame(&mut self, now: DateTime<Utc>) -> bool {
        if self.cycle.cycle_kind != CycleKind::Focus || !self.camera.is_held() {
            return true;
        }

        let frame = match self.camera.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.record_read_failure(now, "camera returned no frame".to_string());
                return false;
            }
            Err(err) => {
                self.record_read_failure(now, format!("{err:#}"));
                return false;
            }
        };

        if self.consecutive_failures > 0 {
            log_info!(
                "camera recovered after {} failed read(s)",
                self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }
        if self.device != DeviceStatus::Streaming {
            self.set_device(now, DeviceStatus::Streaming);
        }

        let detector = &mut self.detector;
        let detections = self
            .cache
            .detections_for_frame(now, || detector.detect(&frame));
        let event = self.tracker.adapt(&detections, now);

        if self.config.mode == DetectionMode::PhoneAlerts
            && event.phone_seen
            && self.alert_gate.try_fire(now)
        {
            log_info!("phone in view; alert raised");
            self.emit(SessionEvent::PhoneAlert { at: now });
        }

        self.latest_frame = Some(Arc::new(frame));
        self.latest_detections = detections;
        true
    }

    fn record_read_failure(&mut self, now: DateTime<Utc>, reason: String) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        log_debug!(
            "frame read failed ({} in a row): {}",
            self.consecutive_failures,
            reason
        );
        if self.consecutive_failures == self.config.device_failure_threshold {
            log_warn!(
                "camera failing: {} consecutive reads without a frame ({})",
                self.consecutive_failures,
                reason
            );
            self.set_device(
                now,
                DeviceStatus::Failing {
                    consecutive_failures: self.consecutive_failures,
                    reason,
                },
            );
        }
    }

    fn sample_if_due(&mut self, now: DateTime<Utc>) {
        let due = self
            .last_sample_at
            .map(|last| now - last >= self.config.sample_interval())
            .unwrap_or(true);
        if !due {
            return;
        }
        self.last_sample_at = Some(now);

        let observed = if self.cycle.cycle_kind == CycleKind::Focus && self.camera.is_held() {
            classify(
                now,
                self.tracker.last_pen_seen_at(),
                self.tracker.last_phone_seen_at(),
            )
        } else {
            ActivityState::Idle
        };
        self.record_activity(now, observed);
    }

    fn record_activity(&mut self, now: DateTime<Utc>, state: ActivityState) {
        self.recorder.sample(now, state);
        if state != self.activity {
            let from = self.activity;
            self.activity = state;
            self.emit(SessionEvent::ActivityChanged {
                from,
                to: state,
                at: now,
            });
        }
    }

    fn acquire_camera(&mut self, now: DateTime<Utc>) {
        self.cache.reset();
        self.tracker.reset();
        self.consecutive_failures = 0;
        match self.camera.acquire() {
            Ok(()) => self.set_device(now, DeviceStatus::Streaming),
            Err(err) => {
                log_warn!("camera unavailable, focusing without detection: {err:#}");
                self.set_device(
                    now,
                    DeviceStatus::Unavailable {
                        reason: format!("{err:#}"),
                    },
                );
            }
        }
    }

    fn release_camera(&mut self, now: DateTime<Utc>) {
        if self.camera.is_held() {
            self.camera.release();
        }
        self.latest_frame = None;
        self.latest_detections.clear();
        if self.device != DeviceStatus::Released {
            self.set_device(now, DeviceStatus::Released);
        }
    }

    fn finish(&mut self, now: DateTime<Utc>, outcome: SessionRunState) {
        self.release_camera(now);
        self.countdown.halt();
        self.recorder.finalize(now);
        if outcome == SessionRunState::Completed {
            self.cycle.time_remaining_secs = 0;
        }

        let summary = SessionSummary {
            session_id: self.session_id.clone().unwrap_or_default(),
            outcome,
            started_at: self.recorder.started_at().unwrap_or(now),
            ended_at: now,
            periods: self.recorder.periods().to_vec(),
            totals: self.recorder.totals(),
        };
        log_info!(
            "session {} {}: studying {:.1}s, playing {:.1}s, idle {:.1}s",
            summary.session_id,
            outcome,
            summary.totals.studying,
            summary.totals.playing,
            summary.totals.idle
        );
        self.summary = Some(summary.clone());
        self.set_run_state(now, outcome);
        self.emit(SessionEvent::Finished { summary });
    }

    fn set_run_state(&mut self, now: DateTime<Utc>, run_state: SessionRunState) {
        self.run_state = run_state;
        self.emit(SessionEvent::RunStateChanged { run_state, at: now });
    }

    fn set_device(&mut self, now: DateTime<Utc>, status: DeviceStatus) {
        self.device = status.clone();
        self.emit(SessionEvent::DeviceStatus { status, at: now });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.outbox.push(event);
    }
}
