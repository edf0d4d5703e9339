//! Hand tracking to O2lite-style messages.
//!
//! This crate drives a hand-detection model against a live video feed and
//! publishes every detected bounding box as one outbound message to
//! `/htclient/obj` with signature `ifffff`
//! (class id, score, x, y, width, height).
//!
//! # Architecture
//!
//! Everything runs on one thread. A tick is one detect, publish, render cycle;
//! ticks are strictly sequential and a new one is armed only after the
//! previous one has finished.
//!
//! # Module Structure
//!
//! - `frame_loop`: the Idle/Running state machine and the tick
//! - `session`: model loading, ensemble setup and the cooperative driver
//! - `sink`: per-prediction publishing and overlay rendering
//! - `detect`: model traits, load parameters and predictions
//! - `ingest`: video sources (stub, V4L2)
//! - `transport`: messengers (in-memory, log, MQTT)
//! - `message`: outbound messages and signature checks
//! - `scheduler`: refresh-rate tick scheduling
//! - `status`: the last-write-wins status note
//! - `config`: file and environment configuration

pub mod config;
pub mod detect;
pub mod frame;
pub mod frame_loop;
pub mod ingest;
pub mod message;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod status;
pub mod transport;

pub use config::{BridgeConfig, MessengerKind, MessengerSettings};
pub use detect::{BBox, HandModel, ModelLoader, ModelParams, Prediction};
pub use frame::{Canvas, Frame};
pub use frame_loop::{DetectFailurePolicy, FrameLoop, TickOutcome, TrackingState};
pub use ingest::{open_source, VideoSettings, VideoSource};
pub use message::{O2Arg, OutboundMessage, OBJECT_ADDRESS, OBJECT_TYPES};
pub use scheduler::{FrameScheduler, ImmediateScheduler, RefreshScheduler};
pub use session::{drive, initialize, Control, DriveExit, DriveLimits, DriveSummary};
pub use sink::{PublishReport, Sink};
pub use status::{LogStatus, StatusNote, StatusSink};
pub use transport::{LogMessenger, MemoryMessenger, Messenger, MqttMessenger};
