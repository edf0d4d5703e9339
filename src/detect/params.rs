use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Load-time configuration handed to a `ModelLoader`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Mirror the input, e.g. for a user-facing camera.
    pub flip_horizontal: bool,
    /// Maximum number of boxes reported per frame.
    pub max_num_boxes: u32,
    /// IoU threshold for non-max suppression.
    pub iou_threshold: f32,
    /// Minimum confidence for a prediction to be reported.
    pub score_threshold: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            flip_horizontal: true,
            max_num_boxes: 20,
            iou_threshold: 0.5,
            score_threshold: 0.6,
        }
    }
}

impl ModelParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_num_boxes == 0 {
            return Err(anyhow!("max_num_boxes must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(anyhow!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(anyhow!(
                "score_threshold must be within [0, 1], got {}",
                self.score_threshold
            ));
        }
        Ok(())
    }
}
