use std::fmt;

/// Size (`width x height`) of an image, camera frame, window or network input.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns the [`AspectRatio`] of this resolution, or [`None`] if it has no area.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Ratio of a width to a height, reduced to lowest terms.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1, the input shape of both hand networks.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Creates the aspect ratio `width:height`, or returns [`None`] if either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let (mut a, mut b) = (width, height);
        while b != 0 {
            (a, b) = (b, a % b);
        }
        Some(Self {
            width: width / a,
            height: height / a,
        })
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_reduces() {
        assert_eq!(AspectRatio::new(1920, 1080).unwrap().to_string(), "16:9");
        assert_eq!(
            AspectRatio::new(1280, 720),
            Resolution::new(1920, 1080).aspect_ratio()
        );
        assert_eq!(AspectRatio::new(224, 224), Some(AspectRatio::SQUARE));
        assert_eq!(AspectRatio::new(0, 10), None);
    }
}
