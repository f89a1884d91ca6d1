//! Anchor generation for Single Shot MultiBox Detectors (SSDs).
//!
//! Only fixed-size anchors are supported, which is all the palm detection network needs.

use std::ops::Index;

use crate::image::Resolution;

/// An anchor of an SSD network, in normalized `[0, 1]` input coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    boxes_per_cell: u32,
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a layer with a `width x height` feature map and `boxes_per_cell` anchors in each
    /// cell.
    ///
    /// # Panics
    ///
    /// Panics if `boxes_per_cell` is zero.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell != 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// The full list of anchors of a network, in output order.
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut anchors = Vec::new();
        for layer in layers {
            let (width, height) = (layer.resolution.width(), layer.resolution.height());
            for y in 0..height {
                for x in 0..width {
                    let anchor = Anchor {
                        x_center: (x as f32 + 0.5) / width as f32,
                        y_center: (y as f32 + 0.5) / height as f32,
                    };
                    // All boxes of a cell share its center, they differ only in learned offsets.
                    anchors.extend((0..layer.boxes_per_cell).map(|_| anchor));
                }
            }
        }

        Self { anchors }
    }

    #[inline]
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Anchor> {
        self.anchors.iter()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palm_anchor_layout() {
        let anchors = Anchors::calculate(&[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)]);
        assert_eq!(anchors.anchor_count(), 2016);

        // Both boxes of the first cell.
        assert_eq!(anchors[0], anchors[1]);
        assert_eq!(anchors[0].x_center(), 0.5 / 24.0);
        assert_eq!(anchors[2].x_center(), 1.5 / 24.0);

        // First anchor of the second layer.
        let first = anchors[24 * 24 * 2];
        assert_eq!(first.x_center(), 0.5 / 12.0);
        assert_eq!(first.y_center(), 0.5 / 12.0);
        assert_eq!(anchors[2015].y_center(), 11.5 / 12.0);
    }
}
