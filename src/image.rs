//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image that camera frames are decoded into and overlays are
//!   drawn onto.
//! - [`ImageView`], a borrowed rectangular window into an [`Image`], used to feed regions of a frame
//!   to neural networks.
//! - A handful of [`draw`] functions for the overlay.
//! - [`Rect`], [`Resolution`] and [`AspectRatio`].

pub mod draw;
mod rect;
mod resolution;

#[cfg(test)]
mod tests;

use std::fmt;

use anyhow::{bail, Context};
use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{ImageBuffer, Rgba, RgbaImage};

pub use rect::*;
pub use resolution::*;

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // RGBA8 so that frames can be uploaded to the window texture without conversion.
    buf: RgbaImage,
}

impl Image {
    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image from tightly packed RGBA8 pixel data.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> anyhow::Result<Self> {
        let expected = res.num_pixels() as usize * 4;
        if buf.len() != expected {
            bail!(
                "incorrect buffer size {} for {} image (expected {} bytes)",
                buf.len(),
                res,
                expected,
            );
        }

        let buf = ImageBuffer::from_vec(res.width(), res.height(), buf.to_vec())
            .context("buffer size does not match image resolution")?;
        Ok(Self { buf })
    }

    /// Decodes a JFIF JPEG or Motion JPEG frame.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        let buf = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8();
        Ok(Self { buf })
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] positioned at `(0, 0)` covering this image.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Gets the color at the given pixel coordinates.
    ///
    /// Returns [`None`] if `(x, y)` is outside of the image.
    pub fn get(&self, x: u32, y: u32) -> Option<Color> {
        self.buf.get_pixel_checked(x, y).map(|pix| Color(pix.0))
    }

    /// Sets the color at the given pixel coordinates. Writes outside the image are ignored.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        if let Some(pix) = self.buf.get_pixel_mut_checked(x, y) {
            *pix = Rgba(color.0);
        }
    }

    /// Creates an immutable view into an area of this image.
    ///
    /// `rect` may lie partially or entirely outside of `self`; pixels outside of the image read as
    /// [`Color::NULL`]. The view always has the size of `rect`.
    pub fn view(&self, rect: Rect) -> ImageView<'_> {
        ImageView { image: self, rect }
    }

    pub fn flip_horizontal(&self) -> Image {
        Image {
            buf: image::imageops::flip_horizontal(&self.buf),
        }
    }

    /// Mirrors the image around its vertical center line.
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }

    /// Sets every pixel to `color`.
    pub fn clear(&mut self, color: Color) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = color.0);
    }

    /// Returns the raw RGBA8 pixel data, row by row.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

/// An immutable view of a rectangular section of an [`Image`].
///
/// The view rectangle may extend past the image borders.
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    rect: Rect,
}

impl<'a> ImageView<'a> {
    /// Width of the view, in pixels (rounded).
    pub fn width(&self) -> u32 {
        self.rect.width().round() as u32
    }

    /// Height of the view, in pixels (rounded).
    pub fn height(&self) -> u32 {
        self.rect.height().round() as u32
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// The viewed area in the coordinates of the underlying [`Image`].
    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Samples the view at relative coordinates `u, v` in `[0, 1)`.
    ///
    /// Uses nearest-neighbor sampling. Samples outside of the underlying image are
    /// [`Color::NULL`].
    pub fn sample(&self, u: f32, v: f32) -> Color {
        let x = (self.rect.x() + u * self.rect.width()).floor();
        let y = (self.rect.y() + v * self.rect.height()).floor();
        if x < 0.0 || y < 0.0 {
            return Color::NULL;
        }
        self.image.get(x as u32, y as u32).unwrap_or(Color::NULL)
    }

    /// Gets the color at pixel `(x, y)` of the view.
    pub fn get(&self, x: u32, y: u32) -> Color {
        let ix = (self.rect.x() + x as f32).floor();
        let iy = (self.rect.y() + y as f32).floor();
        if ix < 0.0 || iy < 0.0 {
            return Color::NULL;
        }
        self.image.get(ix as u32, iy as u32).unwrap_or(Color::NULL)
    }

    /// Copies the contents of this view into a new [`Image`].
    pub fn to_image(&self) -> Image {
        let mut out = Image::new(self.width(), self.height());
        for y in 0..out.height() {
            for x in 0..out.width() {
                out.set(x, y, self.get(x, y));
            }
        }
        out
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ImageView @ {:?}", self.width(), self.height(), self.rect)
    }
}

/// An 8-bit RGBA color.
///
/// Colors are always in the sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

// FIXME leaks `embedded-graphics` dependency
impl PixelColor for Color {
    type Raw = RawU32;
}
