//! Video sources.
//!
//! - Stub source (`stub://...`): synthetic frames, for demos and tests
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! A source is started and stopped by the frame loop. `start` reports `false`
//! when the camera is unavailable or access is refused; that is a normal
//! outcome, not an error. `current_frame` is only valid while streaming.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod stub;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::frame::Frame;

pub use stub::{StubConfig, StubVideoSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

pub trait VideoSource: Send {
    /// Begin streaming. `Ok(false)` means the source is unavailable or was refused.
    fn start(&mut self) -> Result<bool>;

    /// Halt streaming. Stopping a stopped source is a no-op.
    fn stop(&mut self);

    fn is_streaming(&self) -> bool;

    /// Grab the most recent frame.
    fn current_frame(&mut self) -> Result<Frame>;
}

/// Settings shared by every source kind.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoSettings {
    /// `stub://<name>` or, with `ingest-v4l2`, a device path such as `/dev/video0`.
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

/// Open the source named by `settings.url`.
pub fn open_source(settings: &VideoSettings) -> Result<Box<dyn VideoSource>> {
    if settings.url.starts_with("stub://") {
        return Ok(Box::new(StubVideoSource::new(StubConfig::from_settings(
            settings,
        ))));
    }
    open_device(settings)
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(settings: &VideoSettings) -> Result<Box<dyn VideoSource>> {
    let path = settings.url.strip_prefix("v4l2://").unwrap_or(&settings.url);
    Ok(Box::new(V4l2Source::new(V4l2Config {
        device: path.to_string(),
        target_fps: settings.target_fps,
        width: settings.width,
        height: settings.height,
    })))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(settings: &VideoSettings) -> Result<Box<dyn VideoSource>> {
    Err(anyhow::anyhow!(
        "video url {} needs the ingest-v4l2 feature (only stub:// is built in)",
        settings.url
    ))
}
