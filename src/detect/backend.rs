use anyhow::Result;

use crate::detect::params::ModelParams;
use crate::detect::result::Prediction;
use crate::frame::{Canvas, Frame};

/// Outline color used by the default overlay.
pub const OVERLAY_COLOR: [u8; 3] = [64, 224, 64];

/// A loaded hand-detection model.
///
/// The model is opaque: detection, suppression and drawing are its own business.
/// The frame loop only relies on `detect` returning predictions in pixel space of
/// the frame it was given.
pub trait HandModel: Send {
    /// Model identifier.
    fn name(&self) -> &'static str;

    /// Run one detection pass over a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Prediction>>;

    /// Draw the frame and its predictions onto the canvas.
    ///
    /// The canvas has already been sized to the frame. The default draws the
    /// frame unmodified with one outline per prediction.
    fn render_predictions(
        &self,
        predictions: &[Prediction],
        canvas: &mut Canvas,
        frame: &Frame,
    ) -> Result<()> {
        render_outlines(predictions, canvas, frame, false)
    }
}

/// Produces a model handle from load parameters. Called once per session.
pub trait ModelLoader {
    fn load(&mut self, params: &ModelParams) -> Result<Box<dyn HandModel>>;
}

pub(crate) fn render_outlines(
    predictions: &[Prediction],
    canvas: &mut Canvas,
    frame: &Frame,
    mirror: bool,
) -> Result<()> {
    canvas.draw_frame(frame, mirror)?;
    for prediction in predictions {
        canvas.stroke_rect(&prediction.bbox, OVERLAY_COLOR, 2);
    }
    Ok(())
}
