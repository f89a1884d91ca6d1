//! Drawing finger counts onto a frame.

use crate::{
    hand::{fingers::FingerCount, Hand, LandmarkIdx},
    image::{draw, Color, Image, Rect},
};

/// Colors and positions of everything the overlay draws.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// Background of the total count, in frame pixels.
    pub panel: Rect,
    pub panel_color: Color,
    pub total_color: Color,
    pub label_color: Color,
    /// Keypoint the per-hand label is placed next to.
    pub anchor: usize,
    /// Pixel offset of the per-hand label from the anchor keypoint.
    pub label_offset: (i32, i32),
    pub skeleton_color: Color,
    pub marker_color: Color,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            panel: Rect::from_top_left(20.0, 20.0, 300.0, 50.0),
            panel_color: Color::from_rgb8(50, 50, 50),
            total_color: Color::WHITE,
            label_color: Color::YELLOW,
            anchor: LandmarkIdx::MiddleFingerMcp as usize,
            label_offset: (-20, -30),
            skeleton_color: Color::GREEN,
            marker_color: Color::RED,
        }
    }
}

impl OverlayStyle {
    /// Draws the filled panel with the frame's total inside it.
    pub fn draw_total(&self, image: &mut Image, total: u32) {
        draw::rect(image, self.panel)
            .fill()
            .color(self.panel_color);

        let text = format!("Total fingers: {total}");
        let center = self.panel.center();
        draw::text(
            image,
            self.panel.x().round() as i32 + 10,
            center.y.round() as i32,
            &text,
        )
        .large()
        .align_left()
        .color(self.total_color);
    }

    /// Draws the lines in `connections` between keypoints of `hand`, then a marker on every
    /// keypoint.
    ///
    /// Connections referring to keypoints the hand doesn't have are skipped.
    pub fn draw_skeleton(&self, image: &mut Image, hand: &Hand, connections: &[(usize, usize)]) {
        for &(a, b) in connections {
            if let (Some(a), Some(b)) = (hand.keypoint(a), hand.keypoint(b)) {
                draw::line(image, a.x as i32, a.y as i32, b.x as i32, b.y as i32)
                    .color(self.skeleton_color);
            }
        }
        for kp in hand.keypoints() {
            draw::marker(image, kp.x as i32, kp.y as i32).color(self.marker_color);
        }
    }

    /// Position of the per-hand label, or [`None`] if `hand` has no anchor keypoint.
    pub fn label_anchor(&self, hand: &Hand) -> Option<(i32, i32)> {
        let kp = hand.keypoint(self.anchor)?;
        let (dx, dy) = self.label_offset;
        let clamp = |v: u32| i32::try_from(v).unwrap_or(i32::MAX);
        Some((clamp(kp.x).saturating_add(dx), clamp(kp.y).saturating_add(dy)))
    }

    /// Draws `"{label}: {count}"` next to the hand's anchor keypoint.
    ///
    /// Returns where the label was drawn.
    pub fn draw_label(
        &self,
        image: &mut Image,
        hand: &Hand,
        label: &str,
        count: FingerCount,
    ) -> Option<(i32, i32)> {
        let (x, y) = self.label_anchor(hand)?;
        let text = format!("{label}: {count}");
        draw::text(image, x, y, &text)
            .large()
            .align_left()
            .color(self.label_color);
        Some((x, y))
    }
}

#[cfg(test)]
mod tests {
    use crate::hand::{Keypoint, CONNECTIVITY, NUM_LANDMARKS};

    use super::*;

    fn count(image: &Image, color: Color) -> usize {
        (0..image.height())
            .flat_map(|y| (0..image.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| image.get(x, y) == Some(color))
            .count()
    }

    fn hand_at(x: u32, y: u32) -> Hand {
        (0..NUM_LANDMARKS as u32)
            .map(|i| Keypoint::new(x + (i % 5) * 10, y + (i / 5) * 10))
            .collect()
    }

    #[test]
    fn default_style() {
        let style = OverlayStyle::default();
        assert_eq!(style.anchor, 9);
        assert_eq!(style.label_offset, (-20, -30));
        assert_eq!(style.panel, Rect::from_top_left(20.0, 20.0, 300.0, 50.0));
    }

    #[test]
    fn total_panel() {
        let style = OverlayStyle::default();
        let mut image = Image::new(400, 100);
        style.draw_total(&mut image, 7);

        assert_eq!(image.get(20, 20), Some(style.panel_color));
        assert_eq!(image.get(319, 69), Some(style.panel_color));
        assert_eq!(image.get(320, 70), Some(Color::NULL));
        assert!(count(&image, style.total_color) > 0);
    }

    #[test]
    fn label_is_offset_from_anchor() {
        let style = OverlayStyle::default();
        let hand = hand_at(100, 100);
        // Keypoint 9 is at (140, 110).
        assert_eq!(style.label_anchor(&hand), Some((120, 80)));

        let mut image = Image::new(200, 200);
        let pos = style.draw_label(&mut image, &hand, "Hand", FingerCount::MAX);
        assert_eq!(pos, Some((120, 80)));
        assert!(count(&image, style.label_color) > 0);
    }

    #[test]
    fn short_hand_is_not_labelled() {
        let style = OverlayStyle::default();
        let hand: Hand = [Keypoint::new(5, 5)].into_iter().collect();
        let mut image = Image::new(50, 50);
        assert_eq!(style.draw_label(&mut image, &hand, "Hand", FingerCount::MAX), None);
        assert_eq!(count(&image, style.label_color), 0);
    }

    #[test]
    fn far_away_anchor_saturates() {
        let mut keypoints = vec![Keypoint::new(0, 0); NUM_LANDMARKS];
        keypoints[9] = Keypoint::new(u32::MAX, 1 << 31);
        let hand = Hand::new(keypoints);

        let style = OverlayStyle::default();
        assert_eq!(
            style.label_anchor(&hand),
            Some((i32::MAX - 20, i32::MAX - 30))
        );

        let style = OverlayStyle {
            label_offset: (5, 5),
            ..OverlayStyle::default()
        };
        assert_eq!(style.label_anchor(&hand), Some((i32::MAX, i32::MAX)));
    }

    #[test]
    fn skeleton_and_markers() {
        let style = OverlayStyle::default();
        let hand = hand_at(10, 10);
        let mut image = Image::new(64, 64);
        style.draw_skeleton(&mut image, &hand, CONNECTIVITY);
        assert!(count(&image, style.skeleton_color) > 0);
        assert_eq!(image.get(10, 10), Some(style.marker_color));

        // Without connections only markers are drawn.
        let mut image = Image::new(64, 64);
        style.draw_skeleton(&mut image, &hand, &[]);
        assert_eq!(count(&image, style.skeleton_color), 0);
        assert!(count(&image, style.marker_color) > 0);
    }
}
