//! Object detection building blocks shared by SSD-style detectors.

pub mod nms;
pub mod ssd;

use nalgebra::Point2;

use crate::image::Rect;

/// A detected object: a confidence score, a bounding rectangle and detector-specific keypoints.
///
/// The confidence is expected to lie in `[0, 1]`, which [`nms::SuppressionMode::Average`] relies
/// on when weighting overlapping detections.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    rect: Rect,
    keypoints: Vec<Point2<f32>>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Point2<f32>>) -> Self {
        Self {
            confidence,
            rect,
            keypoints,
        }
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[inline]
    pub fn keypoints(&self) -> &[Point2<f32>] {
        &self.keypoints
    }

    /// Applies `f` to the rectangle and every keypoint, e.g. to move them to another coordinate
    /// system.
    pub fn map_coords(&mut self, f: impl Fn(Point2<f32>) -> Point2<f32>) {
        let top_left = f(Point2::new(self.rect.x(), self.rect.y()));
        let bottom_right = f(Point2::new(
            self.rect.x() + self.rect.width(),
            self.rect.y() + self.rect.height(),
        ));
        self.rect = Rect::from_top_left(
            top_left.x,
            top_left.y,
            bottom_right.x - top_left.x,
            bottom_right.y - top_left.y,
        );
        for kp in &mut self.keypoints {
            *kp = f(*kp);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn map_coords_moves_everything() {
        let mut det = Detection::with_keypoints(
            0.9,
            Rect::from_top_left(1.0, 1.0, 2.0, 2.0),
            vec![Point2::new(2.0, 2.0)],
        );
        det.map_coords(|p| Point2::new(p.x * 10.0 - 5.0, p.y * 10.0));
        assert_relative_eq!(det.rect().x(), 5.0);
        assert_relative_eq!(det.rect().y(), 10.0);
        assert_relative_eq!(det.rect().width(), 20.0);
        assert_relative_eq!(det.rect().height(), 20.0);
        assert_eq!(det.keypoints(), &[Point2::new(15.0, 20.0)]);
        assert_eq!(det.confidence(), 0.9);
    }
}
