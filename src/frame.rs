//! Video frames and the overlay drawing surface.
//!
//! - `Frame`: one RGB8 image grabbed from a `VideoSource`. Ephemeral, one per tick.
//! - `Canvas`: the display surface predictions are rendered onto, sized to the video frame.

use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use std::path::Path;

use crate::detect::BBox;

/// Bytes per pixel for every frame handled by the crate (RGB8).
pub const BYTES_PER_PIXEL: usize = 3;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One RGB8 video frame.
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic per-source frame counter, starting at 1.
    pub sequence: u64,
}

impl Frame {
    /// Wrap packed RGB8 pixels. The buffer length must match the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            sequence,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| anyhow!("frame dimensions overflow: {}x{}", width, height))
}

// ----------------------------------------------------------------------------
// Canvas
// ----------------------------------------------------------------------------

/// RGB drawing surface for the prediction overlay.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Resize to the frame's dimensions if they differ. Contents are discarded on resize.
    pub fn fit_to(&mut self, frame: &Frame) {
        if self.image.dimensions() != (frame.width, frame.height) {
            log::debug!(
                "canvas resized {}x{} -> {}x{}",
                self.image.width(),
                self.image.height(),
                frame.width,
                frame.height
            );
            self.image = RgbImage::new(frame.width, frame.height);
        }
    }

    /// Copy the frame into the canvas, mirrored horizontally when `mirror` is set.
    pub fn draw_frame(&mut self, frame: &Frame, mirror: bool) -> Result<()> {
        if self.image.dimensions() != (frame.width, frame.height) {
            return Err(anyhow!(
                "canvas is {}x{} but frame is {}x{}",
                self.image.width(),
                self.image.height(),
                frame.width,
                frame.height
            ));
        }
        let row = frame.width as usize * BYTES_PER_PIXEL;
        let target: &mut [u8] = &mut self.image;
        for (dst, src) in target
            .chunks_exact_mut(row)
            .zip(frame.pixels().chunks_exact(row))
        {
            if mirror {
                for (d, s) in dst
                    .chunks_exact_mut(BYTES_PER_PIXEL)
                    .zip(src.chunks_exact(BYTES_PER_PIXEL).rev())
                {
                    d.copy_from_slice(s);
                }
            } else {
                dst.copy_from_slice(src);
            }
        }
        Ok(())
    }

    /// Draw a rectangle outline, clipped to the canvas.
    pub fn stroke_rect(&mut self, bbox: &BBox, color: [u8; 3], thickness: u32) {
        let (w, h) = self.image.dimensions();
        if w == 0 || h == 0 || thickness == 0 {
            return;
        }
        let Some(clipped) = bbox.clamp_to(w as f32, h as f32) else {
            return;
        };
        let x0 = clipped.x.floor() as u32;
        let y0 = clipped.y.floor() as u32;
        let x1 = ((clipped.x + clipped.width).ceil() as u32).min(w).saturating_sub(1);
        let y1 = ((clipped.y + clipped.height).ceil() as u32).min(h).saturating_sub(1);
        let pixel = Rgb(color);

        for t in 0..thickness {
            let top = y0.saturating_add(t).min(y1);
            let bottom = y1.saturating_sub(t).max(y0);
            for x in x0..=x1 {
                self.image.put_pixel(x, top, pixel);
                self.image.put_pixel(x, bottom, pixel);
            }
            let left = x0.saturating_add(t).min(x1);
            let right = x1.saturating_sub(t).max(x0);
            for y in y0..=y1 {
                self.image.put_pixel(left, y, pixel);
                self.image.put_pixel(right, y, pixel);
            }
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.image.width() || y >= self.image.height() {
            return None;
        }
        Some(self.image.get_pixel(x, y).0)
    }

    /// Write the current overlay to disk; the format follows the file extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.image
            .save(path)
            .with_context(|| format!("failed to write canvas snapshot {}", path.display()))
    }
}
