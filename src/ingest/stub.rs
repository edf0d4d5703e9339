//! Synthetic video source for `stub://` urls.
//!
//! `stub://denied` behaves like a camera whose permission prompt was refused:
//! `start` reports `false` and no frames are produced.

use anyhow::{anyhow, Result};

use super::{VideoSettings, VideoSource};
use crate::frame::{Frame, BYTES_PER_PIXEL};

/// Url that simulates a refused camera.
pub const DENIED_URL: &str = "stub://denied";

#[derive(Clone, Debug)]
pub struct StubConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Refuse to start, as if camera access was denied.
    pub deny: bool,
}

impl StubConfig {
    pub fn from_settings(settings: &VideoSettings) -> Self {
        Self {
            url: settings.url.clone(),
            width: settings.width,
            height: settings.height,
            deny: settings.url == DENIED_URL,
        }
    }
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: 640,
            height: 480,
            deny: false,
        }
    }
}

pub struct StubVideoSource {
    config: StubConfig,
    streaming: bool,
    frame_count: u64,
    starts: u64,
}

impl StubVideoSource {
    pub fn new(config: StubConfig) -> Self {
        Self {
            config,
            streaming: false,
            frame_count: 0,
            starts: 0,
        }
    }

    /// Successful `start` calls so far.
    pub fn starts(&self) -> u64 {
        self.starts
    }

    /// Dark gradient background with a bright square sweeping left to right.
    fn generate_pixels(&self) -> Vec<u8> {
        let w = self.config.width as usize;
        let h = self.config.height as usize;
        let mut pixels = vec![0u8; w * h * BYTES_PER_PIXEL];

        let side = (w.min(h) / 6).max(1);
        let span = w.saturating_sub(side).max(1);
        let left = (self.frame_count as usize * 4) % span;
        let top = h.saturating_sub(side) / 2;

        for (i, px) in pixels.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let (x, y) = (i % w, i / w);
            let inside = x >= left && x < left + side && y >= top && y < top + side;
            if inside {
                px.copy_from_slice(&[230, 190, 160]);
            } else {
                let shade = ((x + y + self.frame_count as usize) % 64) as u8;
                px.copy_from_slice(&[shade, shade, shade.saturating_add(16)]);
            }
        }
        pixels
    }
}

impl VideoSource for StubVideoSource {
    fn start(&mut self) -> Result<bool> {
        if self.config.deny {
            log::warn!("StubVideoSource: {} refused to start", self.config.url);
            return Ok(false);
        }
        if !self.streaming {
            self.streaming = true;
            self.starts += 1;
            log::info!(
                "StubVideoSource: streaming {} ({}x{})",
                self.config.url,
                self.config.width,
                self.config.height
            );
        }
        Ok(true)
    }

    fn stop(&mut self) {
        if self.streaming {
            log::info!("StubVideoSource: stopped {}", self.config.url);
        }
        self.streaming = false;
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn current_frame(&mut self) -> Result<Frame> {
        if !self.streaming {
            return Err(anyhow!("video source {} is not streaming", self.config.url));
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(deny: bool) -> StubConfig {
        StubConfig {
            url: "stub://test".to_string(),
            width: 48,
            height: 36,
            deny,
        }
    }

    #[test]
    fn produces_numbered_frames_while_streaming() -> Result<()> {
        let mut source = StubVideoSource::new(config(false));
        assert!(source.current_frame().is_err());

        assert!(source.start()?);
        let first = source.current_frame()?;
        let second = source.current_frame()?;
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.pixels().len(), 48 * 36 * 3);
        assert_ne!(first.pixels(), second.pixels());

        source.stop();
        assert!(!source.is_streaming());
        assert!(source.current_frame().is_err());
        Ok(())
    }

    #[test]
    fn denied_source_never_streams() -> Result<()> {
        let mut source = StubVideoSource::new(config(true));
        assert!(!source.start()?);
        assert!(!source.is_streaming());
        assert_eq!(source.starts(), 0);
        Ok(())
    }

    #[test]
    fn denied_url_sets_deny() {
        let settings = VideoSettings {
            url: DENIED_URL.to_string(),
            width: 8,
            height: 8,
            target_fps: 30,
        };
        assert!(StubConfig::from_settings(&settings).deny);
    }
}
