//! Palm detection.
//!
//! Finds palms in a full frame with the MediaPipe palm detection network. The detections are only
//! used to place the region of interest for the landmark network.

use std::path::Path;

use nalgebra::Point2;

use crate::{
    detection::{
        nms::NonMaxSuppression,
        ssd::{Anchors, LayerInfo},
        Detection,
    },
    image::{Image, Rect, Resolution},
    nn::{Cnn, ColorMapper, Outputs},
    num::sigmoid,
    timer::Timer,
};

/// The keypoints of a palm [`Detection`], in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;
/// Box center, box size, then `x, y` of every keypoint.
const VALUES_PER_ANCHOR: usize = 4 + NUM_KEYPOINTS * 2;

const LAYERS: &[LayerInfo] = &[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    thresh: f32,
    t_infer: Timer,
    t_nms: Timer,
}

impl PalmDetector {
    /// Loads the palm detection network from an ONNX file.
    ///
    /// Detections with a confidence below `thresh` are discarded.
    pub fn load<P: AsRef<Path>>(path: P, thresh: f32) -> anyhow::Result<Self> {
        let cnn = Cnn::load(path, ColorMapper::linear(0.0..=1.0))?;
        Ok(Self {
            cnn,
            anchors: Anchors::calculate(LAYERS),
            nms: NonMaxSuppression::new(),
            thresh,
            t_infer: Timer::new("palm infer"),
            t_nms: Timer::new("palm nms"),
        })
    }

    pub fn input_resolution(&self) -> Resolution {
        self.cnn.input_resolution()
    }

    /// Detects palms in `image`.
    ///
    /// The image is letterboxed to the network's aspect ratio. Returned detections are in pixel
    /// coordinates of `image`, most confident first.
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.input_resolution();
        let input_aspect = match input_res.aspect_ratio() {
            Some(aspect) => aspect,
            None => anyhow::bail!("palm detection network has empty input {}", input_res),
        };
        let area = image.rect().grow_to_fit_aspect(input_aspect);

        let outputs = self.t_infer.time(|| self.cnn.estimate(&image.view(area)))?;
        let mut detections = decode(&self.anchors, input_res, &outputs, self.thresh)?;

        let mut detections = self.t_nms.time(|| self.nms.process(&mut detections));
        let (scale_x, scale_y) = (
            area.width() / input_res.width() as f32,
            area.height() / input_res.height() as f32,
        );
        for det in &mut detections {
            det.map_coords(|p| Point2::new(area.x() + p.x * scale_x, area.y() + p.y * scale_y));
        }

        log::trace!("palm detections: {:?}", detections);
        Ok(detections)
    }

    pub fn timers(&self) -> [&Timer; 2] {
        [&self.t_infer, &self.t_nms]
    }
}

/// Decodes the raw network outputs into detections in network input pixel coordinates.
fn decode(
    anchors: &Anchors,
    input_res: Resolution,
    outputs: &Outputs,
    thresh: f32,
) -> anyhow::Result<Vec<Detection>> {
    let num_anchors = anchors.anchor_count();
    let boxes = outputs.values(0, num_anchors * VALUES_PER_ANCHOR)?;
    let scores = outputs.values(1, num_anchors)?;
    Ok(decode_raw(anchors, input_res, boxes, scores, thresh))
}

fn decode_raw(
    anchors: &Anchors,
    input_res: Resolution,
    boxes: &[f32],
    scores: &[f32],
    thresh: f32,
) -> Vec<Detection> {
    let (input_w, input_h) = (input_res.width() as f32, input_res.height() as f32);

    anchors
        .iter()
        .zip(scores)
        .zip(boxes.chunks_exact(VALUES_PER_ANCHOR))
        .filter_map(|((anchor, &score), params)| {
            let confidence = sigmoid(score);
            if confidence < thresh {
                return None;
            }

            let (ax, ay) = (anchor.x_center() * input_w, anchor.y_center() * input_h);
            let rect = Rect::from_center(
                params[0] + ax,
                params[1] + ay,
                params[2],
                params[3],
            );
            let keypoints = params[4..]
                .chunks_exact(2)
                .map(|xy| Point2::new(xy[0] + ax, xy[1] + ay))
                .collect();

            Some(Detection::with_keypoints(confidence, rect, keypoints))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn decodes_confident_anchors_only() {
        let anchors = Anchors::calculate(LAYERS);
        let n = anchors.anchor_count();
        let mut scores = vec![-10.0; n];
        let mut boxes = vec![0.0; n * VALUES_PER_ANCHOR];

        // Anchor 0 is centered at (0.5/24, 0.5/24), i.e. (4, 4) in a 192x192 input.
        scores[0] = 3.0;
        boxes[..6].copy_from_slice(&[1.0, -1.0, 20.0, 30.0, 2.0, 2.0]);

        let res = Resolution::new(192, 192);
        let dets = decode_raw(&anchors, res, &boxes, &scores, 0.7);
        assert_eq!(dets.len(), 1);

        let det = &dets[0];
        assert_relative_eq!(det.confidence(), sigmoid(3.0));
        assert_relative_eq!(det.rect().center().x, 5.0);
        assert_relative_eq!(det.rect().center().y, 3.0);
        assert_relative_eq!(det.rect().width(), 20.0);
        assert_relative_eq!(det.rect().height(), 30.0);
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_eq!(
            det.keypoints()[PalmKeypoint::Wrist as usize],
            Point2::new(6.0, 6.0)
        );
        assert_eq!(
            det.keypoints()[PalmKeypoint::ThumbMcp as usize],
            Point2::new(4.0, 4.0)
        );

        assert!(decode_raw(&anchors, res, &boxes, &scores, 0.99).is_empty());
    }
}
