//! Hand landmark prediction.

use std::path::Path;

use nalgebra::Point2;

use crate::{
    image::{Image, Rect, Resolution},
    nn::{Cnn, ColorMapper},
    timer::Timer,
};

use super::{Hand, Handedness, Keypoint, LandmarkIdx, NUM_LANDMARKS};

/// Runs the 21-landmark hand network on a region of a frame.
pub struct Landmarker {
    cnn: Cnn,
    t_infer: Timer,
}

impl Landmarker {
    /// Loads the hand landmark network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            cnn: Cnn::load(path, ColorMapper::linear(0.0..=1.0))?,
            t_infer: Timer::new("landmarks"),
        })
    }

    pub fn input_resolution(&self) -> Resolution {
        self.cnn.input_resolution()
    }

    /// Computes hand landmarks inside `roi` of `image`.
    ///
    /// `roi` should have the network's aspect ratio (square) and may extend past the image
    /// borders. The returned positions are in pixel coordinates of `image`.
    pub fn compute(&mut self, image: &Image, roi: Rect) -> anyhow::Result<LandmarkResult> {
        let input_res = self.input_resolution();
        let outputs = self.t_infer.time(|| self.cnn.estimate(&image.view(roi)))?;

        let screen_landmarks = outputs.values(0, NUM_LANDMARKS * 3)?;
        let presence = outputs.values(1, 1)?[0];
        let raw_handedness = outputs.values(2, 1)?[0];
        log::trace!("landmark presence={presence} handedness={raw_handedness}");

        let (scale_x, scale_y) = (
            roi.width() / input_res.width() as f32,
            roi.height() / input_res.height() as f32,
        );
        let positions = screen_landmarks
            .chunks_exact(3)
            .map(|xyz| Point2::new(roi.x() + xyz[0] * scale_x, roi.y() + xyz[1] * scale_y))
            .collect();

        Ok(LandmarkResult {
            positions,
            presence,
            raw_handedness,
        })
    }

    pub fn timer(&self) -> &Timer {
        &self.t_infer
    }
}

/// Landmarks of one hand, as returned by [`Landmarker::compute`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    positions: Vec<Point2<f32>>,
    presence: f32,
    raw_handedness: f32,
}

impl LandmarkResult {
    pub fn new(positions: Vec<Point2<f32>>, presence: f32, raw_handedness: f32) -> Self {
        Self {
            positions,
            presence,
            raw_handedness,
        }
    }

    /// Landmark positions in frame pixel coordinates, indexed by [`LandmarkIdx`].
    #[inline]
    pub fn positions(&self) -> &[Point2<f32>] {
        &self.positions
    }

    pub fn position(&self, idx: LandmarkIdx) -> Option<Point2<f32>> {
        self.positions.get(idx as usize).copied()
    }

    /// Confidence that a hand is actually present in the region, between 0.0 and 1.0.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Only meaningful when [`presence`][Self::presence] is high.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    /// Converts the landmarks to a [`Hand`] in a frame of resolution `res`.
    ///
    /// Positions are rounded to the nearest pixel and clamped into the frame.
    pub fn to_hand(&self, res: Resolution) -> Hand {
        let max_x = res.width().saturating_sub(1) as f32;
        let max_y = res.height().saturating_sub(1) as f32;
        let hand: Hand = self
            .positions
            .iter()
            .map(|p| {
                Keypoint::new(
                    p.x.round().clamp(0.0, max_x) as u32,
                    p.y.round().clamp(0.0, max_y) as u32,
                )
            })
            .collect();
        hand.with_handedness(self.handedness())
    }
}
