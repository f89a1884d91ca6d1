//! Non-Maximum Suppression and Averaging.
//!
//! SSD networks report every object several times from neighbouring anchors. Non-maximum
//! suppression keeps one detection per object: [`SuppressionMode::Remove`] keeps only the most
//! confident one, [`SuppressionMode::Average`] replaces the overlapping group with its
//! confidence-weighted average.

use nalgebra::{Point2, Vector2};

use crate::{image::Rect, num::TotalF32};

use super::Detection;

/// Describes how [`NonMaxSuppression`] deals with overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Keep only the detection with the highest confidence.
    Remove,

    /// Replace overlapping detections by their confidence-weighted average.
    Average,
}

pub struct NonMaxSuppression {
    iou_thresh: f32,
    mode: SuppressionMode,
    group: Vec<Detection>,
}

impl NonMaxSuppression {
    /// Default intersection-over-union threshold at which two detections are considered the same
    /// object.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a suppressor using [`SuppressionMode::Average`] and
    /// [`Self::DEFAULT_IOU_THRESH`].
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            mode: SuppressionMode::Average,
            group: Vec::new(),
        }
    }

    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Drains `detections` and returns the surviving detections, most confident first.
    pub fn process(&mut self, detections: &mut Vec<Detection>) -> Vec<Detection> {
        let mut out = Vec::new();

        // Ascending order, so the most confident detection is popped first.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence()));

        while let Some(seed) = detections.pop() {
            let seed_rect = seed.rect();
            let iou_thresh = self.iou_thresh;
            let (overlapping, rest): (Vec<_>, Vec<_>) = detections
                .drain(..)
                .partition(|other| seed_rect.iou(&other.rect()) >= iou_thresh);
            *detections = rest;

            match self.mode {
                SuppressionMode::Remove => out.push(seed),
                SuppressionMode::Average => {
                    self.group.clear();
                    self.group.push(seed);
                    self.group.extend(overlapping);
                    out.push(average(&self.group));
                }
            }
        }

        out
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Confidence-weighted average of `group`. The result keeps the confidence of `group[0]`.
fn average(group: &[Detection]) -> Detection {
    let seed = &group[0];
    let mut center = Vector2::zeros();
    let mut size = Vector2::zeros();
    let mut keypoints = vec![Vector2::zeros(); seed.keypoints().len()];
    let mut divisor = 0.0;

    for det in group {
        let weight = det.confidence();
        divisor += weight;

        let rect = det.rect();
        center += rect.center().coords * weight;
        size += Vector2::new(rect.width(), rect.height()) * weight;

        // Detections from one network always carry the same number of keypoints.
        for (acc, kp) in keypoints.iter_mut().zip(det.keypoints()) {
            *acc += kp.coords * weight;
        }
    }

    if divisor <= 0.0 {
        return seed.clone();
    }

    let center = center / divisor;
    let size = size / divisor;
    Detection::with_keypoints(
        seed.confidence(),
        Rect::from_center(center.x, center.y, size.x, size.y),
        keypoints
            .into_iter()
            .map(|acc| Point2::from(acc / divisor))
            .collect(),
    )
}
