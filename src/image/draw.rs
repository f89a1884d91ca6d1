//! Overlay drawing.
//!
//! Every function returns a guard that draws when dropped, so options can be chained onto the call:
//!
//! ```no_run
//! # use fingercount::image::{draw, Color, Image};
//! # let mut image = Image::new(64, 64);
//! draw::text(&mut image, 10, 10, "hi").color(Color::WHITE).align_left();
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii, MonoFont, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use super::{Color, Image, Rect};

/// Guard returned by [`rect`]; draws the rectangle when dropped and allows customization.
pub struct DrawRect<'a> {
    image: &'a mut Image,
    rect: Rect,
    color: Color,
    stroke_width: u32,
    filled: bool,
}

impl DrawRect<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the outline width. Has no effect on filled rectangles.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }

    /// Fills the whole rectangle instead of drawing its outline.
    pub fn fill(&mut self) -> &mut Self {
        self.filled = true;
        self
    }
}

impl Drop for DrawRect<'_> {
    fn drop(&mut self) {
        let style = if self.filled {
            PrimitiveStyle::with_fill(self.color)
        } else {
            PrimitiveStyle::with_stroke(self.color, self.stroke_width)
        };
        let rect = Rectangle::new(
            Point::new(self.rect.x().round() as i32, self.rect.y().round() as i32),
            Size::new(
                self.rect.width().round() as u32,
                self.rect.height().round() as u32,
            ),
        );
        infallible(rect.into_styled(style).draw(&mut Target(self.image)));
    }
}

/// Guard returned by [`marker`]; draws the marker when dropped and allows customization.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    color: Color,
    size: u32,
}

impl DrawMarker<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the width and height of the marker.
    ///
    /// The default size is 5. The size must be *uneven* and *non-zero*.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size % 2 == 1, "marker size must be an uneven number");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        // An `X` through the marker position.
        let offset = ((self.size - 1) / 2) as i32;
        let pixels = (-offset..=offset).flat_map(|d| {
            [
                Pixel(Point::new(self.x + d, self.y + d), self.color),
                Pixel(Point::new(self.x + d, self.y - d), self.color),
            ]
        });
        infallible(Target(self.image).draw_iter(pixels));
    }
}

/// Guard returned by [`line`][line()]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        infallible(
            Line::new(self.start, self.end)
                .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
                .draw(&mut Target(self.image)),
        );
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
    font: &'static MonoFont<'static>,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Uses a 10x20 pixel font instead of the default 6x10 one.
    pub fn large(&mut self) -> &mut Self {
        self.font = &ascii::FONT_10X20;
        self
    }

    /// Aligns the top of the text with the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(self.font, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        infallible(
            Text::with_text_style(
                self.text,
                Point::new(self.x, self.y),
                character_style,
                text_style,
            )
            .draw(&mut Target(self.image))
            .map(drop),
        );
    }
}

/// Draws a rectangle outline (or, with [`DrawRect::fill`], a filled rectangle).
pub fn rect(image: &mut Image, rect: Rect) -> DrawRect<'_> {
    DrawRect {
        image,
        rect,
        color: Color::RED,
        stroke_width: 1,
        filled: false,
    }
}

/// Draws a marker onto an image.
///
/// This is used to visualize individual landmarks.
pub fn marker(image: &mut Image, x: i32, y: i32) -> DrawMarker<'_> {
    DrawMarker {
        image,
        x,
        y,
        color: Color::RED,
        size: 5,
    }
}

/// Draws a line from `(start_x, start_y)` to `(end_x, end_y)`.
pub fn line(
    image: &mut Image,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> DrawLine<'_> {
    DrawLine {
        image,
        start: Point::new(start_x, start_y),
        end: Point::new(end_x, end_y),
        color: Color::BLUE,
        stroke_width: 1,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is drawn centered horizontally and vertically around `x` and `y`.
pub fn text<'a>(image: &'a mut Image, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        x,
        y,
        text,
        color: Color::RED,
        font: &ascii::FONT_6X10,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

fn infallible<T>(res: Result<T, Infallible>) -> T {
    match res {
        Ok(t) => t,
        Err(never) => match never {},
    }
}

struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.0.width(), self.0.height()))
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            if pos.x >= 0 && pos.y >= 0 {
                // Out-of-bounds writes are dropped by `Image::set`.
                self.0.set(pos.x as u32, pos.y as u32, color);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(image: &Image, color: Color) -> usize {
        (0..image.height())
            .flat_map(|y| (0..image.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| image.get(x, y) == Some(color))
            .count()
    }

    #[test]
    fn filled_rect_covers_area() {
        let mut image = Image::new(10, 10);
        rect(&mut image, Rect::from_top_left(2.0, 2.0, 3.0, 4.0))
            .fill()
            .color(Color::GREEN);
        assert_eq!(count(&image, Color::GREEN), 12);
        assert_eq!(image.get(2, 2), Some(Color::GREEN));
        assert_eq!(image.get(5, 2), Some(Color::NULL));
    }

    #[test]
    fn drawing_outside_is_clipped() {
        let mut image = Image::new(4, 4);
        line(&mut image, -10, 1, 10, 1).color(Color::WHITE);
        marker(&mut image, 100, 100);
        assert_eq!(count(&image, Color::WHITE), 4);
        assert_eq!(count(&image, Color::RED), 0);
    }

    #[test]
    fn text_draws_glyphs() {
        let mut image = Image::new(40, 20);
        text(&mut image, 0, 0, "5")
            .align_left()
            .align_top()
            .color(Color::YELLOW);
        let n = count(&image, Color::YELLOW);
        assert!(n > 0 && n < 6 * 10, "{n} pixels drawn");
    }
}
