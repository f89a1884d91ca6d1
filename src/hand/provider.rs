//! Landmark providers: turning a frame into a list of [`Hand`]s.
//!
//! [`HandLandmarker`] is the bundled implementation. It runs palm detection to find hands, then the
//! landmark network on a square region around each palm. Regions of hands that were found with
//! enough confidence are reused in the next frame, so palm detection only has to run while fewer
//! than `max_hands` hands are visible.

use std::{mem, path::Path};

use anyhow::ensure;
use nalgebra::{Point2, Vector2};

use crate::{
    detection::Detection,
    image::{Image, Rect},
    timer::Timer,
};

use super::{
    detection::{PalmDetector, PalmKeypoint},
    landmark::Landmarker,
    Hand, LandmarkIdx, CONNECTIVITY,
};

/// Finds hands in a frame.
pub trait LandmarkProvider {
    /// Returns the hands visible in `image`, in pixel coordinates of `image`.
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Hand>>;

    /// Keypoint index pairs to connect when drawing a hand skeleton.
    fn connections(&self) -> &[(usize, usize)] {
        &[]
    }

    /// Timers of the provider's internal stages, logged along with the frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Hand>> {
        (**self).detect(image)
    }

    fn connections(&self) -> &[(usize, usize)] {
        (**self).connections()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

/// Scale from palm size to landmark ROI size.
const PALM_ROI_SCALE: f32 = 2.6;
/// Shift of the palm ROI towards the fingers, relative to the palm size.
const PALM_ROI_SHIFT: f32 = 0.5;
/// Scale from the landmark bounding box to the ROI used in the next frame.
const TRACKING_ROI_SCALE: f32 = 2.0;
/// Shift of the tracking ROI towards the fingers, relative to the ROI size.
const TRACKING_ROI_SHIFT: f32 = 0.1;
/// ROIs overlapping at least this much are assumed to contain the same hand.
const ROI_IOU_THRESH: f32 = 0.3;

/// Configuration of a [`HandLandmarker`].
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarkerOptions {
    max_hands: usize,
    detection_confidence: f32,
    tracking_confidence: f32,
}

impl Default for HandLandmarkerOptions {
    fn default() -> Self {
        Self {
            max_hands: 2,
            detection_confidence: 0.7,
            tracking_confidence: 0.5,
        }
    }
}

impl HandLandmarkerOptions {
    /// Sets the maximum number of hands to report per frame. Must be at least 1.
    ///
    /// Defaults to 2.
    pub fn max_hands(self, max_hands: usize) -> Self {
        Self { max_hands, ..self }
    }

    /// Sets the minimum palm detection score for a new hand.
    ///
    /// Defaults to 0.7.
    pub fn detection_confidence(self, detection_confidence: f32) -> Self {
        Self {
            detection_confidence,
            ..self
        }
    }

    /// Sets the minimum landmark presence score for a hand to be reported and tracked into the next
    /// frame.
    ///
    /// Defaults to 0.5.
    pub fn tracking_confidence(self, tracking_confidence: f32) -> Self {
        Self {
            tracking_confidence,
            ..self
        }
    }

    pub fn get_max_hands(&self) -> usize {
        self.max_hands
    }

    pub fn get_detection_confidence(&self) -> f32 {
        self.detection_confidence
    }

    pub fn get_tracking_confidence(&self) -> f32 {
        self.tracking_confidence
    }

    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.max_hands >= 1, "`max_hands` must be at least 1");
        for (name, value) in [
            ("detection_confidence", self.detection_confidence),
            ("tracking_confidence", self.tracking_confidence),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "`{}` must be between 0 and 1, got {}",
                name,
                value
            );
        }
        Ok(())
    }
}

/// Palm detection followed by hand landmark estimation, on the CPU.
pub struct HandLandmarker {
    detector: PalmDetector,
    landmarker: Landmarker,
    options: HandLandmarkerOptions,
    tracked: Vec<Rect>,
}

impl HandLandmarker {
    /// Loads both networks from ONNX files.
    pub fn load<P: AsRef<Path>, L: AsRef<Path>>(
        palm_model: P,
        landmark_model: L,
        options: HandLandmarkerOptions,
    ) -> anyhow::Result<Self> {
        options.validate()?;
        let detector = PalmDetector::load(palm_model, options.detection_confidence)?;
        let landmarker = Landmarker::load(landmark_model)?;
        log::info!(
            "hand landmarker ready (palm input {}, landmark input {}, {:?})",
            detector.input_resolution(),
            landmarker.input_resolution(),
            options,
        );

        Ok(Self {
            detector,
            landmarker,
            options,
            tracked: Vec::new(),
        })
    }

}

impl LandmarkProvider for HandLandmarker {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Hand>> {
        let max_hands = self.options.max_hands;
        let mut rois = mem::take(&mut self.tracked);

        if rois.len() < max_hands {
            for det in self.detector.detect(image)? {
                if rois.len() >= max_hands {
                    break;
                }
                if let Some(roi) = roi_from_palm(&det) {
                    if !overlaps_any(&rois, &roi) {
                        rois.push(roi);
                    }
                }
            }
        }

        let mut hands = Vec::with_capacity(rois.len());
        for roi in rois {
            let result = self.landmarker.compute(image, roi)?;
            if result.presence() < self.options.tracking_confidence {
                log::trace!("lost hand in {:?} (presence {})", roi, result.presence());
                continue;
            }

            match roi_from_landmarks(result.positions()) {
                Some(next) if !overlaps_any(&self.tracked, &next) => self.tracked.push(next),
                // Two regions converged on the same hand.
                _ => continue,
            }
            hands.push(result.to_hand(image.resolution()));
        }

        Ok(hands)
    }

    fn connections(&self) -> &[(usize, usize)] {
        CONNECTIVITY
    }

    fn timers(&self) -> Vec<&Timer> {
        let mut timers = self.detector.timers().to_vec();
        timers.push(self.landmarker.timer());
        timers
    }
}

fn overlaps_any(rois: &[Rect], roi: &Rect) -> bool {
    rois.iter().any(|other| other.iou(roi) >= ROI_IOU_THRESH)
}

/// Normalized direction from the wrist towards the fingers, or straight up if the points coincide.
fn finger_direction(wrist: Point2<f32>, middle_mcp: Point2<f32>) -> Vector2<f32> {
    (middle_mcp - wrist)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| Vector2::new(0.0, -1.0))
}

/// Computes the landmark ROI for a palm detection.
fn roi_from_palm(det: &Detection) -> Option<Rect> {
    let wrist = *det.keypoints().get(PalmKeypoint::Wrist as usize)?;
    let middle_mcp = *det.keypoints().get(PalmKeypoint::MiddleFingerMcp as usize)?;

    let rect = det.rect();
    let size = rect.width().max(rect.height());
    let shift = finger_direction(wrist, middle_mcp) * (size * PALM_ROI_SHIFT);
    let center = rect.center() + shift;
    let side = size * PALM_ROI_SCALE;
    Some(Rect::from_center(center.x, center.y, side, side))
}

/// Computes the ROI to track a hand into the next frame from its landmarks.
fn roi_from_landmarks(positions: &[Point2<f32>]) -> Option<Rect> {
    let wrist = *positions.get(LandmarkIdx::Wrist as usize)?;
    let middle_mcp = *positions.get(LandmarkIdx::MiddleFingerMcp as usize)?;

    let roi = Rect::bounding(positions.iter().copied())?
        .to_square()
        .scale(TRACKING_ROI_SCALE);
    let shift = finger_direction(wrist, middle_mcp) * (roi.width() * TRACKING_ROI_SHIFT);
    Some(roi.move_by(shift.x, shift.y))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn default_options() {
        let options = HandLandmarkerOptions::default();
        assert_eq!(options.get_max_hands(), 2);
        assert_eq!(options.get_detection_confidence(), 0.7);
        assert_eq!(options.get_tracking_confidence(), 0.5);
        options.validate().unwrap();

        let options = options.max_hands(4).tracking_confidence(0.9);
        assert_eq!(options.get_max_hands(), 4);
        assert_eq!(options.get_tracking_confidence(), 0.9);
    }

    #[test]
    fn invalid_options() {
        let options = HandLandmarkerOptions::default();
        assert!(options.clone().max_hands(0).validate().is_err());
        assert!(options.clone().detection_confidence(1.5).validate().is_err());
        assert!(options.tracking_confidence(-0.1).validate().is_err());
    }

    #[test]
    fn palm_roi_extends_towards_fingers() {
        let mut keypoints = vec![Point2::new(100.0, 100.0); 7];
        keypoints[PalmKeypoint::Wrist as usize] = Point2::new(100.0, 120.0);
        keypoints[PalmKeypoint::MiddleFingerMcp as usize] = Point2::new(100.0, 90.0);
        let det = Detection::with_keypoints(
            0.9,
            Rect::from_center(100.0, 100.0, 40.0, 30.0),
            keypoints,
        );

        let roi = roi_from_palm(&det).unwrap();
        assert_relative_eq!(roi.center().x, 100.0);
        assert_relative_eq!(roi.center().y, 80.0);
        assert_relative_eq!(roi.width(), 104.0);
        assert_relative_eq!(roi.height(), 104.0);

        assert!(roi_from_palm(&Detection::new(0.9, det.rect())).is_none());
    }

    #[test]
    fn tracking_roi_from_landmarks() {
        // A hand pointing right: wrist on the left, middle MCP 40px to its right.
        let mut positions = vec![Point2::new(60.0, 50.0); 21];
        positions[LandmarkIdx::Wrist as usize] = Point2::new(20.0, 50.0);
        positions[LandmarkIdx::MiddleFingerMcp as usize] = Point2::new(60.0, 50.0);
        positions[LandmarkIdx::MiddleFingerTip as usize] = Point2::new(120.0, 40.0);
        positions[LandmarkIdx::ThumbTip as usize] = Point2::new(70.0, 80.0);

        // Bounding box: x 20..120, y 40..80, center (70, 60), square side 100 -> 200.
        let roi = roi_from_landmarks(&positions).unwrap();
        assert_relative_eq!(roi.width(), 200.0);
        assert_relative_eq!(roi.height(), 200.0);
        assert_relative_eq!(roi.center().x, 90.0);
        assert_relative_eq!(roi.center().y, 60.0);

        assert!(roi_from_landmarks(&positions[..5]).is_none());
    }

    #[test]
    fn degenerate_direction_points_up() {
        let p = Point2::new(3.0, 3.0);
        assert_eq!(finger_direction(p, p), Vector2::new(0.0, -1.0));
    }

    #[test]
    fn overlapping_rois() {
        let a = Rect::from_center(0.0, 0.0, 10.0, 10.0);
        assert!(overlaps_any(&[a], &a.move_by(1.0, 0.0)));
        assert!(!overlaps_any(&[a], &a.move_by(9.0, 0.0)));
        assert!(!overlaps_any(&[], &a));
    }

    struct Fixed(Vec<Hand>);

    impl LandmarkProvider for Fixed {
        fn detect(&mut self, _: &Image) -> anyhow::Result<Vec<Hand>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn boxed_provider_forwards() {
        let mut boxed: Box<dyn LandmarkProvider> = Box::new(Fixed(vec![Hand::default()]));
        assert_eq!(boxed.detect(&Image::new(1, 1)).unwrap().len(), 1);
        assert!(boxed.connections().is_empty());
        assert!(boxed.timers().is_empty());
    }
}
