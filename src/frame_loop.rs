//! The frame-polling loop.
//!
//! `FrameLoop` is a two-state machine (Idle, Running) plus one "armed" slot
//! for the next tick:
//!
//! - `start` (Idle, source starts) -> Running, arms the first tick
//! - `stop` -> Idle; an already-armed tick still runs once and then does not re-arm
//! - `tick` consumes the armed slot: detect, publish, render, re-arm while Running
//!
//! Nothing here sleeps or blocks; a driver decides when armed ticks run
//! (see `session::drive`). At most one tick is ever armed.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::str::FromStr;

use crate::detect::{HandModel, Prediction};
use crate::frame::Canvas;
use crate::ingest::VideoSource;
use crate::sink::{PublishReport, Sink};
use crate::status::StatusSink;

pub const STATUS_STARTING: &str = "Starting video";
pub const STATUS_STARTED: &str = "Video started. Now tracking";
pub const STATUS_ENABLE_VIDEO: &str = "Please enable video";
pub const STATUS_STOPPING: &str = "Stopping video";
pub const STATUS_STOPPED: &str = "Video stopped";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingState {
    Idle,
    Running,
}

/// What a tick does when the frame grab or detection fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectFailurePolicy {
    /// Stop tracking and surface the failure.
    #[default]
    Halt,
    /// Log the failure and try again on the next frame.
    Skip,
}

impl FromStr for DetectFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "halt" => Ok(Self::Halt),
            "skip" => Ok(Self::Skip),
            other => Err(anyhow!(
                "unknown detection failure policy {:?} (expected halt or skip)",
                other
            )),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No tick was armed; nothing happened.
    NotArmed,
    Completed {
        predictions: usize,
        report: PublishReport,
        rearmed: bool,
    },
    Failed {
        rearmed: bool,
    },
    /// Ran after `stop` with the source already halted; nothing was detected.
    Drained,
}

pub struct FrameLoop {
    active: bool,
    armed: bool,
    model: Box<dyn HandModel>,
    video: Box<dyn VideoSource>,
    sink: Sink,
    status: Box<dyn StatusSink>,
    policy: DetectFailurePolicy,
    ticks_run: u64,
}

impl FrameLoop {
    pub fn new(
        model: Box<dyn HandModel>,
        video: Box<dyn VideoSource>,
        sink: Sink,
        status: Box<dyn StatusSink>,
        policy: DetectFailurePolicy,
    ) -> Self {
        Self {
            active: false,
            armed: false,
            model,
            video,
            sink,
            status,
            policy,
            ticks_run: 0,
        }
    }

    pub fn state(&self) -> TrackingState {
        if self.active {
            TrackingState::Running
        } else {
            TrackingState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True when a tick is waiting to run.
    pub fn tick_armed(&self) -> bool {
        self.armed
    }

    pub fn ticks_run(&self) -> u64 {
        self.ticks_run
    }

    pub fn canvas(&self) -> &Canvas {
        self.sink.canvas()
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Start the video source and, if it comes up, begin tracking.
    ///
    /// Returns whether tracking is running afterwards. Calling `start` while
    /// running changes nothing and never arms a second tick.
    pub fn start(&mut self) -> bool {
        if self.active {
            log::debug!("start ignored: already tracking");
            return true;
        }
        let started = match self.video.start() {
            Ok(started) => started,
            Err(e) => {
                log::warn!("video source failed to start: {:#}", e);
                false
            }
        };
        if !started {
            self.status.notify(STATUS_ENABLE_VIDEO);
            return false;
        }
        self.active = true;
        self.status.notify(STATUS_STARTED);
        self.armed = true;
        true
    }

    /// Stop tracking. An armed tick is left in place; it runs once more and
    /// then sees the loop idle.
    pub fn stop(&mut self) {
        self.status.notify(STATUS_STOPPING);
        self.video.stop();
        self.active = false;
        self.status.notify(STATUS_STOPPED);
    }

    /// The track button: start when idle, stop when running.
    pub fn toggle(&mut self) -> TrackingState {
        if self.active {
            self.stop();
        } else {
            self.status.notify(STATUS_STARTING);
            self.start();
        }
        self.state()
    }

    /// Run the armed tick, if any.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.armed {
            return TickOutcome::NotArmed;
        }
        self.armed = false;
        self.ticks_run += 1;

        let frame = match self.video.current_frame() {
            Ok(frame) => frame,
            Err(e) if !self.active => {
                log::debug!("tick {} drained after stop: {:#}", self.ticks_run, e);
                return TickOutcome::Drained;
            }
            Err(e) => return self.detection_failed(e.context("grab video frame")),
        };
        let predictions = match self.model.detect(&frame) {
            Ok(predictions) => predictions,
            Err(e) => return self.detection_failed(e.context("hand detection")),
        };

        log_predictions(&predictions);
        self.sink.messenger_mut().relay_status(self.status.as_mut());
        let report = self.sink.publish(&predictions);
        if let Err(e) = self.sink.render(self.model.as_ref(), &predictions, &frame) {
            log::warn!("render failed: {:#}", e);
        }
        TickOutcome::Completed {
            predictions: predictions.len(),
            report,
            rearmed: self.rearm(),
        }
    }

    /// Stop tracking if needed and release the messaging transport.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.active {
            self.stop();
        }
        self.armed = false;
        let messenger = self.sink.messenger_mut();
        messenger.relay_status(self.status.as_mut());
        messenger.shutdown()
    }

    fn rearm(&mut self) -> bool {
        self.armed = self.active;
        self.armed
    }

    fn detection_failed(&mut self, err: anyhow::Error) -> TickOutcome {
        match self.policy {
            DetectFailurePolicy::Halt => {
                log::error!("tick {} failed, halting: {:#}", self.ticks_run, err);
                if self.active {
                    self.video.stop();
                    self.active = false;
                }
                self.status.notify(&format!("Detection failed: {:#}", err));
                TickOutcome::Failed { rearmed: false }
            }
            DetectFailurePolicy::Skip => {
                log::warn!("tick {} failed, skipping frame: {:#}", self.ticks_run, err);
                TickOutcome::Failed {
                    rearmed: self.rearm(),
                }
            }
        }
    }
}

fn log_predictions(predictions: &[Prediction]) {
    for p in predictions {
        log::info!(
            "{} class={} score={:.2} bbox=[{:.1}, {:.1}, {:.1}, {:.1}]",
            p.label,
            p.class_id,
            p.score,
            p.bbox.x,
            p.bbox.y,
            p.bbox.width,
            p.bbox.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BBox, ScriptedModel};
    use crate::ingest::{StubConfig, StubVideoSource};
    use crate::status::StatusNote;
    use crate::transport::{MemoryMessenger, Messenger};

    struct Harness {
        frame_loop: FrameLoop,
        messenger: MemoryMessenger,
        note: StatusNote,
    }

    fn harness(model: ScriptedModel, deny: bool, policy: DetectFailurePolicy) -> Harness {
        let messenger = MemoryMessenger::new();
        let note = StatusNote::new();
        let mut boxed: Box<dyn Messenger> = Box::new(messenger.clone());
        boxed
            .initialize("test", &mut note.clone())
            .expect("initialize");
        let video = StubVideoSource::new(StubConfig {
            url: "stub://test".to_string(),
            width: 32,
            height: 24,
            deny,
        });
        let frame_loop = FrameLoop::new(
            Box::new(model),
            Box::new(video),
            Sink::new(boxed, "/htclient/obj", Canvas::new(32, 24)),
            Box::new(note.clone()),
            policy,
        );
        Harness {
            frame_loop,
            messenger,
            note,
        }
    }

    fn hand() -> Prediction {
        Prediction::new(1, 0.92, BBox::new(10.0, 20.0, 30.0, 40.0))
    }

    #[test]
    fn starts_idle_with_nothing_armed() {
        let mut h = harness(ScriptedModel::new(), false, DetectFailurePolicy::Halt);
        assert_eq!(h.frame_loop.state(), TrackingState::Idle);
        assert!(!h.frame_loop.tick_armed());
        assert_eq!(h.frame_loop.tick(), TickOutcome::NotArmed);
        assert_eq!(h.frame_loop.ticks_run(), 0);
    }

    #[test]
    fn start_arms_one_tick_and_rearms_while_running() {
        let mut h = harness(
            ScriptedModel::new().with_batch(vec![hand()]),
            false,
            DetectFailurePolicy::Halt,
        );
        assert!(h.frame_loop.start());
        assert_eq!(h.note.text(), STATUS_STARTED);
        assert!(h.frame_loop.tick_armed());

        let outcome = h.frame_loop.tick();
        assert_eq!(
            outcome,
            TickOutcome::Completed {
                predictions: 1,
                report: PublishReport { sent: 1, failed: 0 },
                rearmed: true,
            }
        );
        assert!(h.frame_loop.tick_armed());
        assert_eq!(h.messenger.sent().len(), 1);
    }

    #[test]
    fn second_start_does_not_double_arm() {
        let mut h = harness(ScriptedModel::new(), false, DetectFailurePolicy::Halt);
        assert!(h.frame_loop.start());
        let updates = h.note.updates();
        assert!(h.frame_loop.start());
        assert_eq!(h.note.updates(), updates);

        h.frame_loop.tick();
        h.frame_loop.stop();
        // Exactly one armed tick drains after stop.
        assert_eq!(h.frame_loop.tick(), TickOutcome::Drained);
        assert_eq!(h.frame_loop.tick(), TickOutcome::NotArmed);
        assert_eq!(h.frame_loop.ticks_run(), 2);
    }

    #[test]
    fn denied_video_stays_idle() {
        let mut h = harness(ScriptedModel::new(), true, DetectFailurePolicy::Halt);
        assert!(!h.frame_loop.start());
        assert_eq!(h.frame_loop.state(), TrackingState::Idle);
        assert!(!h.frame_loop.tick_armed());
        assert_eq!(h.note.text(), STATUS_ENABLE_VIDEO);
    }

    #[test]
    fn toggle_flips_between_states() {
        let mut h = harness(ScriptedModel::new(), false, DetectFailurePolicy::Halt);
        assert_eq!(h.frame_loop.toggle(), TrackingState::Running);
        assert_eq!(h.frame_loop.toggle(), TrackingState::Idle);
        assert_eq!(h.note.text(), STATUS_STOPPED);
    }

    #[test]
    fn stop_when_idle_only_notifies() {
        let mut h = harness(ScriptedModel::new(), false, DetectFailurePolicy::Halt);
        h.frame_loop.stop();
        assert_eq!(h.frame_loop.state(), TrackingState::Idle);
        assert!(!h.frame_loop.tick_armed());
        assert_eq!(h.note.text(), STATUS_STOPPED);
        assert_eq!(h.note.updates(), 2);
    }

    #[test]
    fn halt_policy_stops_on_detection_failure() {
        let model = ScriptedModel::new().with_failure("model crashed");
        let mut h = harness(model, false, DetectFailurePolicy::Halt);
        h.frame_loop.start();
        assert_eq!(h.frame_loop.tick(), TickOutcome::Failed { rearmed: false });
        assert_eq!(h.frame_loop.state(), TrackingState::Idle);
        assert!(!h.frame_loop.tick_armed());
        assert!(h.note.text().starts_with("Detection failed"));
        assert!(h.note.text().contains("model crashed"));
    }

    #[test]
    fn skip_policy_keeps_tracking() {
        let model = ScriptedModel::new()
            .with_failure("dropped frame")
            .with_batch(vec![hand()]);
        let mut h = harness(model, false, DetectFailurePolicy::Skip);
        h.frame_loop.start();
        assert_eq!(h.frame_loop.tick(), TickOutcome::Failed { rearmed: true });
        assert!(matches!(
            h.frame_loop.tick(),
            TickOutcome::Completed { predictions: 1, .. }
        ));
        assert_eq!(h.frame_loop.state(), TrackingState::Running);
    }

    #[test]
    fn messenger_notes_reach_status_before_publish() {
        let mut h = harness(
            ScriptedModel::new().with_batch(vec![hand()]),
            false,
            DetectFailurePolicy::Halt,
        );
        h.frame_loop.start();
        h.messenger.push_note("Disconnected from broker");
        h.frame_loop.tick();
        assert_eq!(h.note.text(), "Disconnected from broker");

        h.messenger.push_note("Connected to broker");
        h.frame_loop.shutdown().expect("shutdown");
        assert_eq!(h.note.text(), "Connected to broker");
    }

    struct CaptureLog {
        lines: std::sync::Mutex<Vec<(log::Level, String)>>,
    }

    impl log::Log for CaptureLog {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            if let Ok(mut lines) = self.lines.lock() {
                lines.push((record.level(), record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: CaptureLog = CaptureLog {
        lines: std::sync::Mutex::new(Vec::new()),
    };

    #[test]
    fn predictions_are_logged_at_info() {
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(log::LevelFilter::Debug);

        let mut h = harness(
            ScriptedModel::new().with_batch(vec![hand()]),
            false,
            DetectFailurePolicy::Halt,
        );
        h.frame_loop.start();
        h.frame_loop.tick();

        let lines = CAPTURE.lines.lock().unwrap();
        assert!(lines.iter().any(|(level, line)| {
            *level == log::Level::Info
                && line == "open class=1 score=0.92 bbox=[10.0, 20.0, 30.0, 40.0]"
        }));
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!("Skip".parse::<DetectFailurePolicy>().unwrap(), DetectFailurePolicy::Skip);
        assert_eq!("halt".parse::<DetectFailurePolicy>().unwrap(), DetectFailurePolicy::Halt);
        assert!("retry".parse::<DetectFailurePolicy>().is_err());
    }

    #[test]
    fn shutdown_stops_tracking_and_disarms() -> Result<()> {
        let mut h = harness(ScriptedModel::new(), false, DetectFailurePolicy::Halt);
        h.frame_loop.start();
        h.frame_loop.shutdown()?;
        assert_eq!(h.frame_loop.state(), TrackingState::Idle);
        assert_eq!(h.frame_loop.tick(), TickOutcome::NotArmed);
        Ok(())
    }
}
