use anyhow::Result;

use crate::detect::backend::{render_outlines, HandModel, ModelLoader};
use crate::detect::params::ModelParams;
use crate::detect::result::{BBox, Prediction};
use crate::frame::{Canvas, Frame};

/// Phase advance per frame for the synthetic hand paths.
const PHASE_STEP: f32 = 0.05;

/// Deterministic stand-in for a trained model.
///
/// Emits an open hand orbiting the frame center, a closed hand drifting along the
/// lower third and a face near the top, with confidences that rise and fall so
/// `score_threshold` visibly filters them. Positions depend only on the frame
/// sequence number and size.
pub struct SyntheticHandModel {
    params: ModelParams,
}

impl SyntheticHandModel {
    pub fn new(params: ModelParams) -> Self {
        Self { params }
    }

    fn candidates(&self, frame: &Frame) -> Vec<Prediction> {
        let w = frame.width as f32;
        let h = frame.height as f32;
        let t = frame.sequence as f32 * PHASE_STEP;
        let size = (w.min(h) * 0.25).max(1.0);

        let centered = |cx: f32, cy: f32, scale: f32| {
            let side = size * scale;
            BBox::new(cx - side / 2.0, cy - side / 2.0, side, side)
        };

        vec![
            Prediction::new(
                1,
                0.75 + 0.2 * (t * 0.7).sin(),
                centered(w / 2.0 + w * 0.3 * t.cos(), h / 2.0 + h * 0.25 * t.sin(), 1.0),
            ),
            Prediction::new(
                2,
                0.65 + 0.1 * t.cos(),
                centered(w / 2.0 - w * 0.3 * (t * 0.5).cos(), h * 0.66, 0.8),
            ),
            Prediction::new(5, 0.9, centered(w / 2.0, h * 0.2, 1.2)),
        ]
    }
}

impl HandModel for SyntheticHandModel {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Prediction>> {
        let mut predictions: Vec<Prediction> = self
            .candidates(frame)
            .into_iter()
            .filter(|p| p.score >= self.params.score_threshold)
            .collect();
        predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
        predictions.truncate(self.params.max_num_boxes as usize);

        if self.params.flip_horizontal {
            let width = frame.width as f32;
            for prediction in &mut predictions {
                prediction.bbox = prediction.bbox.mirrored(width);
            }
        }
        Ok(predictions)
    }

    fn render_predictions(
        &self,
        predictions: &[Prediction],
        canvas: &mut Canvas,
        frame: &Frame,
    ) -> Result<()> {
        // Boxes are already in mirrored space when flipping, so the frame must match.
        render_outlines(predictions, canvas, frame, self.params.flip_horizontal)
    }
}

/// Loader for `SyntheticHandModel`.
#[derive(Default)]
pub struct SyntheticLoader;

impl ModelLoader for SyntheticLoader {
    fn load(&mut self, params: &ModelParams) -> Result<Box<dyn HandModel>> {
        params.validate()?;
        log::info!(
            "synthetic hand model loaded (flip={}, max_boxes={}, score>={})",
            params.flip_horizontal,
            params.max_num_boxes,
            params.score_threshold
        );
        Ok(Box::new(SyntheticHandModel::new(params.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> Frame {
        Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, sequence).unwrap()
    }

    fn params(flip: bool, max: u32, threshold: f32) -> ModelParams {
        ModelParams {
            flip_horizontal: flip,
            max_num_boxes: max,
            iou_threshold: 0.5,
            score_threshold: threshold,
        }
    }

    #[test]
    fn honors_max_boxes_and_sorts_by_score() -> Result<()> {
        let mut model = SyntheticHandModel::new(params(false, 2, 0.0));
        let predictions = model.detect(&frame(10))?;
        assert_eq!(predictions.len(), 2);
        assert!(predictions[0].score >= predictions[1].score);
        Ok(())
    }

    #[test]
    fn score_threshold_filters_everything_above_range() -> Result<()> {
        let mut model = SyntheticHandModel::new(params(false, 20, 0.99));
        assert!(model.detect(&frame(3))?.is_empty());
        Ok(())
    }

    #[test]
    fn flip_mirrors_boxes() -> Result<()> {
        let mut plain = SyntheticHandModel::new(params(false, 20, 0.0));
        let mut flipped = SyntheticHandModel::new(params(true, 20, 0.0));
        let a = plain.detect(&frame(7))?;
        let b = flipped.detect(&frame(7))?;
        assert_eq!(a.len(), b.len());
        for (p, q) in a.iter().zip(&b) {
            assert_eq!(p.class_id, q.class_id);
            assert_eq!(p.bbox.mirrored(64.0), q.bbox);
        }
        Ok(())
    }

    #[test]
    fn loader_rejects_invalid_params() {
        let mut loader = SyntheticLoader;
        assert!(loader.load(&params(true, 0, 0.5)).is_err());
        assert!(loader.load(&ModelParams::default()).is_ok());
    }
}
