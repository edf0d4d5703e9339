use serde::Serialize;

/// Axis-aligned box in source-frame pixels: top-left corner plus size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `[x, y, width, height]`, the order the boxes go out on the wire.
    pub fn to_array(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Reflect the box across the vertical center line of a frame.
    pub fn mirrored(&self, frame_width: f32) -> Self {
        Self {
            x: frame_width - self.x - self.width,
            ..*self
        }
    }

    /// Intersection with a `width` x `height` frame, or `None` if nothing is left.
    pub fn clamp_to(&self, width: f32, height: f32) -> Option<Self> {
        let x0 = self.x.max(0.0);
        let y0 = self.y.max(0.0);
        let x1 = (self.x + self.width).min(width);
        let y1 = (self.y + self.height).min(height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// One detected object instance in a single frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub class_id: i32,
    /// Confidence in [0, 1].
    pub score: f32,
    pub bbox: BBox,
}

impl Prediction {
    pub fn new(class_id: i32, score: f32, bbox: BBox) -> Self {
        Self {
            label: label_for_class(class_id).to_string(),
            class_id,
            score,
            bbox,
        }
    }
}

/// Hand-pose labels used by the handtrack model family, indexed by class id.
pub fn label_for_class(class_id: i32) -> &'static str {
    match class_id {
        1 => "open",
        2 => "closed",
        3 => "pinch",
        4 => "point",
        5 => "face",
        6 => "pointtip",
        7 => "pinchtip",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrored_box_keeps_size() {
        let bbox = BBox::new(10.0, 20.0, 30.0, 40.0).mirrored(100.0);
        assert_eq!(bbox, BBox::new(60.0, 20.0, 30.0, 40.0));
    }

    #[test]
    fn clamp_to_trims_overhang() {
        let bbox = BBox::new(-5.0, 90.0, 20.0, 20.0);
        assert_eq!(bbox.clamp_to(100.0, 100.0), Some(BBox::new(0.0, 90.0, 15.0, 10.0)));
        assert_eq!(BBox::new(120.0, 0.0, 5.0, 5.0).clamp_to(100.0, 100.0), None);
    }

    #[test]
    fn prediction_label_follows_class() {
        assert_eq!(Prediction::new(2, 0.7, BBox::new(0.0, 0.0, 1.0, 1.0)).label, "closed");
        assert_eq!(label_for_class(42), "unknown");
    }
}
