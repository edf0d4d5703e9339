//! Session setup and the cooperative driver.
//!
//! `initialize` joins the ensemble, loads the model once and hands back an idle
//! `FrameLoop`. `drive` then runs everything on the calling thread: control
//! commands are applied between ticks, and an armed tick runs only after the
//! scheduler grants the next frame slot.

use anyhow::{anyhow, Context, Result};
use std::str::FromStr;
use std::sync::mpsc::{Receiver, TryRecvError};

use crate::config::BridgeConfig;
use crate::detect::ModelLoader;
use crate::frame::Canvas;
use crate::frame_loop::{FrameLoop, TickOutcome};
use crate::ingest::VideoSource;
use crate::scheduler::FrameScheduler;
use crate::sink::Sink;
use crate::status::StatusSink;
use crate::transport::Messenger;

pub const STATUS_MODEL_LOADED: &str = "Loaded Model!";

/// Commands from the control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Toggle,
    Start,
    Stop,
    Quit,
}

impl FromStr for Control {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "t" | "toggle" => Ok(Self::Toggle),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            other => Err(anyhow!(
                "unknown command {:?} (use toggle, start, stop or quit)",
                other
            )),
        }
    }
}

/// Join the ensemble and load the model; returns an idle loop ready for control.
pub fn initialize(
    config: &BridgeConfig,
    loader: &mut dyn ModelLoader,
    video: Box<dyn VideoSource>,
    mut messenger: Box<dyn Messenger>,
    mut status: Box<dyn StatusSink>,
) -> Result<FrameLoop> {
    messenger
        .initialize(&config.ensemble, status.as_mut())
        .with_context(|| {
            format!(
                "initialize {} messenger for ensemble {}",
                messenger.name(),
                config.ensemble
            )
        })?;

    let model = match loader.load(&config.model) {
        Ok(model) => model,
        Err(e) => {
            status.notify(&format!("Model failed to load: {:#}", e));
            return Err(e.context("load hand model"));
        }
    };
    log::info!("model {} ready", model.name());
    status.notify(STATUS_MODEL_LOADED);

    let sink = Sink::new(
        messenger,
        config.address.clone(),
        Canvas::new(config.video.width, config.video.height),
    );
    Ok(FrameLoop::new(
        model,
        video,
        sink,
        status,
        config.on_detect_error,
    ))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriveLimits {
    /// Stop tracking and return once this many ticks have run.
    pub max_ticks: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveExit {
    Quit,
    ControlsClosed,
    TickLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriveSummary {
    pub ticks: u64,
    pub messages_sent: u64,
    pub messages_failed: u64,
    pub failed_ticks: u64,
    pub exit: DriveExit,
}

impl DriveSummary {
    fn new() -> Self {
        Self {
            ticks: 0,
            messages_sent: 0,
            messages_failed: 0,
            failed_ticks: 0,
            exit: DriveExit::ControlsClosed,
        }
    }

    fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::NotArmed => return,
            TickOutcome::Completed { report, .. } => {
                self.messages_sent += report.sent as u64;
                self.messages_failed += report.failed as u64;
            }
            TickOutcome::Failed { .. } => self.failed_ticks += 1,
            TickOutcome::Drained => {}
        }
        self.ticks += 1;
    }
}

/// Run the loop until `Quit`, until the control channel closes, or until the tick limit.
///
/// When the channel closes nobody can stop tracking any more, so the driver
/// stops it, lets the armed tick drain, and returns.
pub fn drive(
    frame_loop: &mut FrameLoop,
    controls: &Receiver<Control>,
    scheduler: &mut dyn FrameScheduler,
    limits: DriveLimits,
) -> DriveSummary {
    let mut summary = DriveSummary::new();
    let mut closed = false;

    loop {
        while !closed {
            match controls.try_recv() {
                Ok(Control::Quit) => return finish(frame_loop, summary, DriveExit::Quit),
                Ok(control) => apply(frame_loop, control),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::info!("control channel closed");
                    closed = true;
                    if frame_loop.is_active() {
                        frame_loop.stop();
                    }
                }
            }
        }

        if frame_loop.tick_armed() {
            if limits.max_ticks.is_some_and(|max| summary.ticks >= max) {
                return finish(frame_loop, summary, DriveExit::TickLimit);
            }
            scheduler.wait_for_frame();
            let outcome = frame_loop.tick();
            summary.record(&outcome);
            continue;
        }

        if closed {
            return finish(frame_loop, summary, DriveExit::ControlsClosed);
        }

        match controls.recv() {
            Ok(Control::Quit) => return finish(frame_loop, summary, DriveExit::Quit),
            Ok(control) => apply(frame_loop, control),
            Err(_) => closed = true,
        }
    }
}

fn apply(frame_loop: &mut FrameLoop, control: Control) {
    log::debug!("control: {:?}", control);
    match control {
        Control::Toggle => {
            frame_loop.toggle();
        }
        Control::Start => {
            frame_loop.start();
        }
        Control::Stop => frame_loop.stop(),
        Control::Quit => {}
    }
}

fn finish(frame_loop: &mut FrameLoop, mut summary: DriveSummary, exit: DriveExit) -> DriveSummary {
    if frame_loop.is_active() {
        frame_loop.stop();
    }
    summary.exit = exit;
    log::info!(
        "drive finished ({:?}): {} ticks, {} messages sent, {} failed sends, {} failed ticks",
        exit,
        summary.ticks,
        summary.messages_sent,
        summary.messages_failed,
        summary.failed_ticks
    );
    summary
}
