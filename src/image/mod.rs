//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image used for camera frames, source images and rendered
//!   output alike.
//! - [`Resolution`], [`AspectRatio`] and [`Rect`] for describing image sizes and regions.
//! - [`BoundingRect`] and [`RotatedRect`] for regions that do not line up with the pixel grid.
//! - A few [`draw`] functions to quickly visualize landmarks and text.

pub mod draw;
mod rect;
mod resolution;


use std::{fmt, ops::Index, path::Path};

use anyhow::Context;
use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{imageops::FilterType, GenericImage, GenericImageView, ImageBuffer, Rgba, RgbaImage};
use nalgebra::Point2;

pub use rect::*;
pub use resolution::*;

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone, PartialEq)]
pub struct Image {
    // RGBA8 so that the GUI can upload frames without converting them.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Loads and decodes an image file.
    ///
    /// The format is guessed from the file contents, not the extension. Any image with a color
    /// type supported by the `image` crate is converted to RGBA.
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let reader = image::io::Reader::open(path)
            .with_context(|| format!("failed to open '{}'", path.display()))?
            .with_guessed_format()?;
        let buf = reader.decode()?.to_rgba8();
        log::debug!(
            "loaded {}x{} image from '{}'",
            buf.width(),
            buf.height(),
            path.display()
        );
        Ok(Self { buf })
    }

    /// Creates an image from raw RGBA8 data.
    ///
    /// # Panics
    ///
    /// This will panic if `buf` does not contain exactly `width * height * 4` bytes.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> Self {
        let expected_size = res.width() as usize * res.height() as usize * 4;
        assert_eq!(
            expected_size,
            buf.len(),
            "incorrect buffer size {} for {} image (expected {} bytes)",
            buf.len(),
            res,
            expected_size,
        );

        Self {
            buf: ImageBuffer::from_vec(res.width(), res.height(), buf.to_vec())
                .expect("buffer size does not match image resolution"),
        }
    }

    /// Creates an image from tightly packed RGB8 data, making every pixel opaque.
    ///
    /// Returns `None` if `rgb` does not contain exactly `width * height * 3` bytes.
    pub fn from_rgb8(res: Resolution, rgb: &[u8]) -> Option<Self> {
        if rgb.len() != res.width() as usize * res.height() as usize * 3 {
            return None;
        }
        let data = rgb
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect::<Vec<_>>();
        Some(Self {
            buf: ImageBuffer::from_vec(res.width(), res.height(), data)?,
        })
    }

    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image of a specified size with every pixel set to `color`.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            buf: ImageBuffer::from_pixel(width, height, Rgba(color.0)),
        }
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

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] covering this image.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width(), self.height())
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }

    /// Resizes the image to `res` using linear (triangle) filtering.
    pub fn resize(&self, res: Resolution) -> Image {
        Image {
            buf: image::imageops::resize(&self.buf, res.width(), res.height(), FilterType::Triangle),
        }
    }

    /// Resamples the area covered by `roi` into a new image of resolution `res`.
    ///
    /// The result is upright in `roi`'s coordinate system. Uses bilinear filtering; parts of `roi`
    /// that lie outside of `self` come out black.
    pub fn sample(&self, roi: &RotatedRect, res: Resolution) -> Image {
        let sx = roi.rect().width() / res.width() as f32;
        let sy = roi.rect().height() / res.height() as f32;
        let buf = ImageBuffer::from_fn(res.width(), res.height(), |u, v| {
            let inner = Point2::new((u as f32 + 0.5) * sx, (v as f32 + 0.5) * sy);
            let p = roi.transform_out(inner);
            Rgba(self.bilinear(p.x - 0.5, p.y - 0.5).0)
        });
        Image { buf }
    }

    fn bilinear(&self, x: f32, y: f32) -> Color {
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let texel = |dx: f32, dy: f32| {
            let (px, py) = (x0 + dx, y0 + dy);
            if px < 0.0 || py < 0.0 || px >= self.width() as f32 || py >= self.height() as f32 {
                return Color::BLACK.0.map(f32::from);
            }
            self.get(px as u32, py as u32).0.map(f32::from)
        };
        let [a, b, c, d] = [texel(0.0, 0.0), texel(1.0, 0.0), texel(0.0, 1.0), texel(1.0, 1.0)];
        Color(std::array::from_fn(|i| {
            let top = a[i] + (b[i] - a[i]) * fx;
            let bottom = c[i] + (d[i] - c[i]) * fx;
            (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8
        }))
    }

    /// Copies the part of `self` covered by `rect` into a new [`Image`].
    ///
    /// `rect` is clamped to the bounds of `self`, so the result may be smaller than `rect`.
    pub fn crop(&self, rect: Rect) -> Image {
        let rect = rect.intersect(self.rect());
        Image {
            buf: self
                .buf
                .view(rect.x(), rect.y(), rect.width(), rect.height())
                .to_image(),
        }
    }

    /// Copies all of `src` into `self`, with the top left corner of `src` placed at `(x, y)`.
    ///
    /// Parts of `src` that fall outside of `self` are discarded.
    pub fn blit(&mut self, src: &Image, x: u32, y: u32) {
        let target = Rect::new(x, y, src.width(), src.height()).intersect(self.rect());
        if target.is_empty() {
            return;
        }
        let visible = src.buf.view(0, 0, target.width(), target.height());
        if let Err(e) = self.buf.copy_from(&*visible, target.x(), target.y()) {
            log::error!("blit to {:?} failed: {}", target, e);
        }
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

/// An 8-bit RGBA color.
///
/// Colors are always in the sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
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

impl Index<usize> for Color {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

// FIXME leaks `embedded-graphics` dependency
impl PixelColor for Color {
    type Raw = RawU32;
}
