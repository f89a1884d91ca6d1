use std::fmt;

use nalgebra::{Point2, Vector2};

use super::AspectRatio;

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Used for detection boxes, regions of interest and overlay panels. Rectangles are allowed to have
/// zero width and/or height; negative sizes are not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Point2<f32>,
    size: Vector2<f32>,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Point2::new(x_center, y_center),
            size: Vector2::new(width, height),
        }
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_center(x + width * 0.5, y + height * 0.5, width, height)
    }

    /// Computes the smallest rectangle containing all `points`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<I: IntoIterator<Item = Point2<f32>>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| {
            (min.inf(&p), max.sup(&p))
        });

        Some(Self::from_top_left(
            min.x,
            min.y,
            max.x - min.x,
            max.y - min.y,
        ))
    }

    /// Scales width and height by `scale`, keeping the center in place.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        Self {
            center: self.center,
            size: self.size * scale,
        }
    }

    /// Symmetrically extends one dimension so that the result has the given aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target: AspectRatio) -> Self {
        let target_width = self.height() * target.as_f32();
        let mut res = *self;
        if target_width >= self.width() {
            res.size.x = target_width;
        } else {
            res.size.y = self.width() / target.as_f32();
        }
        res
    }

    /// Returns a square of side `max(width, height)` with the same center.
    #[must_use]
    pub fn to_square(&self) -> Self {
        let side = self.width().max(self.height());
        Self::from_center(self.center.x, self.center.y, side, side)
    }

    #[must_use]
    pub fn move_by(&self, dx: f32, dy: f32) -> Self {
        Self {
            center: self.center + Vector2::new(dx, dy),
            size: self.size,
        }
    }

    /// X coordinate of the left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.center.x - self.size.x * 0.5
    }

    /// Y coordinate of the top edge.
    #[inline]
    pub fn y(&self) -> f32 {
        self.center.y - self.size.y * 0.5
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.center
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Computes the intersection of `self` and `other`, or [`None`] if they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x().max(other.x());
        let y_min = self.y().max(other.y());
        let x_max = (self.x() + self.width()).min(other.x() + other.width());
        let y_max = (self.y() + self.height()).min(other.y() + other.height());
        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Rect::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    /// Computes the Intersection over Union (IoU) of `self` and `other`.
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |r| r.area());
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.center.x, self.center.y, self.size.x, self.size.y
        )
    }
}
