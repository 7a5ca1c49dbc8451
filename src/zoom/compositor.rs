//! Rendering of the zoomed view.

use crate::{
    image::{Color, Image, Rect, Resolution},
    Error, Result,
};

use super::ZoomConfig;

/// Renders a source image at a zoom factor, keeping the source's dimensions.
///
/// When zooming in, the window of `1 / scale` times the source size centered on the source is cut
/// out and resized to the source size with linear filtering. Only that window is resampled, so the
/// cost does not grow with the zoom factor. When zooming out, the whole source is shrunk and
/// centered on a canvas filled with the fill color.
#[derive(Debug, Clone, Copy)]
pub struct ZoomCompositor {
    fill: Color,
}

impl Default for ZoomCompositor {
    fn default() -> Self {
        Self::new(Color::BLACK)
    }
}

impl ZoomCompositor {
    pub fn new(fill: Color) -> Self {
        Self { fill }
    }

    pub fn from_config(config: &ZoomConfig) -> Self {
        Self::new(config.fill)
    }

    /// Renders `source` at zoom factor `scale`.
    ///
    /// Returns [`Error::InvalidScale`] if `scale` is zero, negative or not finite.
    pub fn compose(&self, source: &Image, scale: f32) -> Result<Image> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidScale(scale));
        }

        let (w, h) = (source.width(), source.height());
        if w == 0 || h == 0 {
            return Ok(source.clone());
        }

        if scale > 1.0 {
            let window = Resolution::new(shrunk(w, scale), shrunk(h, scale));
            if window == source.resolution() {
                return Ok(source.clone());
            }
            let left = (w - window.width()) / 2;
            let top = (h - window.height()) / 2;
            log::trace!("zoom {scale:.3}: {window} window @ ({left}, {top}) of {w}x{h}");
            let visible = source.crop(Rect::new(left, top, window.width(), window.height()));
            return Ok(visible.resize(source.resolution()));
        }

        let zoomed_res = Resolution::new(scaled(w, scale), scaled(h, scale));
        if zoomed_res == source.resolution() {
            return Ok(source.clone());
        }
        log::trace!("zoom {scale:.3}: {w}x{h} -> {zoomed_res}");
        let resized = source.resize(zoomed_res);

        let mut canvas = Image::filled(w, h, self.fill);
        canvas.blit(&resized, (w - resized.width()) / 2, (h - resized.height()) / 2);
        Ok(canvas)
    }
}

/// Renders `source` at zoom factor `scale`, padding with black when zooming out.
///
/// See [`ZoomCompositor`] for details.
pub fn compose(source: &Image, scale: f32) -> Result<Image> {
    ZoomCompositor::default().compose(source, scale)
}

fn scaled(len: u32, scale: f32) -> u32 {
    ((len as f32 * scale).round() as u32).clamp(1, len)
}

fn shrunk(len: u32, scale: f32) -> u32 {
    ((len as f32 / scale).round() as u32).clamp(1, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> Image {
        let mut image = Image::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let color = Color::from_rgb8((x * 255 / w) as u8, (y * 255 / h) as u8, 128);
                image.set(x, y, color);
            }
        }
        image
    }

    #[test]
    fn keeps_dimensions() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..50 {
            let (w, h) = (rng.u32(1..120), rng.u32(1..120));
            let scale = 0.05 + rng.f32() * 4.0;
            let source = gradient(w, h);
            let zoomed = compose(&source, scale).unwrap();
            assert_eq!(
                zoomed.resolution(),
                source.resolution(),
                "scale {scale} changed dimensions"
            );
        }
    }

    #[test]
    fn unit_scale_is_identity() {
        let source = gradient(37, 21);
        assert_eq!(compose(&source, 1.0).unwrap(), source);
    }

    #[test]
    fn zoom_in_is_center_crop() {
        let source = gradient(100, 100);
        let zoomed = compose(&source, 2.0).unwrap();
        let expected = source
            .crop(Rect::new(25, 25, 50, 50))
            .resize(Resolution::new(100, 100));
        assert_eq!(zoomed, expected);
    }

    #[test]
    fn zoom_in_samples_only_visible_window() {
        let mut source = Image::filled(100, 60, Color::WHITE);
        source.blit(&Image::filled(20, 12, Color::RED), 40, 24);

        // At 5x, exactly the red 20x12 center is visible.
        let zoomed = compose(&source, 5.0).unwrap();
        assert_eq!(zoomed.resolution(), Resolution::new(100, 60));
        for (x, y) in [(0, 0), (99, 0), (0, 59), (99, 59), (50, 30)] {
            assert_eq!(zoomed.get(x, y), Color::RED, "({x}, {y})");
        }

        // Extreme factors still keep a window of at least one pixel.
        let zoomed = compose(&source, 1000.0).unwrap();
        assert_eq!(zoomed.resolution(), Resolution::new(100, 60));
        assert_eq!(zoomed.get(0, 0), Color::RED);
    }

    #[test]
    fn zoom_out_pads() {
        let source = Image::filled(40, 20, Color::WHITE);
        let zoomed = ZoomCompositor::new(Color::BLUE).compose(&source, 0.5).unwrap();
        assert_eq!(zoomed.resolution(), Resolution::new(40, 20));

        // 20x10 image centered at (10, 5).
        assert_eq!(zoomed.get(0, 0), Color::BLUE);
        assert_eq!(zoomed.get(9, 10), Color::BLUE);
        assert_eq!(zoomed.get(10, 5), Color::WHITE);
        assert_eq!(zoomed.get(29, 14), Color::WHITE);
        assert_eq!(zoomed.get(30, 14), Color::BLUE);
        assert_eq!(zoomed.get(29, 15), Color::BLUE);
    }

    #[test]
    fn invalid_scale() {
        let source = Image::new(4, 4);
        for scale in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                compose(&source, scale),
                Err(Error::InvalidScale(_))
            ));
        }
    }
}
