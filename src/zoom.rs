//! Pinch-to-zoom: from hand landmarks to a zoomed view of an image.
//!
//! The pieces are used in this order for every camera frame:
//!
//! - [`distance`] measures the pinch span of a hand.
//! - [`ZoomScaleTracker`] turns the span into a smoothed zoom factor relative to the span at the
//!   start of the gesture.
//! - [`ZoomCompositor`] renders the source image at that zoom factor, but only once the factor has
//!   changed noticeably.

pub mod compositor;
pub mod distance;
pub mod tracker;

use std::ops::RangeInclusive;

use crate::image::Color;

pub use compositor::{compose, ZoomCompositor};
pub use distance::{distance, PinchPair};
pub use tracker::{TrackerState, ZoomScaleTracker};

/// Tuning parameters of the zoom gesture.
///
/// The [`Default`] configuration uses a smoothing factor of 0.1, a recomposition threshold of
/// 0.01, a zoom range of `0.25..=4.0`, measures between thumb tip and index finger tip, and pads
/// zoomed-out images with opaque black.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomConfig {
    alpha: f32,
    threshold: f32,
    scale_range: RangeInclusive<f32>,
    pinch: PinchPair,
    fill: Color,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            threshold: 0.01,
            scale_range: 0.25..=4.0,
            pinch: PinchPair::default(),
            fill: Color::BLACK,
        }
    }
}

impl ZoomConfig {
    /// Sets the exponential smoothing factor applied to the zoom factor.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is not between 0.0 and 1.0.
    pub fn smoothing(self, alpha: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&alpha),
            "smoothing factor must be between 0.0 and 1.0, got {alpha}"
        );
        Self { alpha, ..self }
    }

    /// Sets how much the zoom factor has to change before the zoomed view is re-rendered.
    pub fn threshold(self, threshold: f32) -> Self {
        Self { threshold, ..self }
    }

    /// Sets the range the smoothed zoom factor is clamped to.
    ///
    /// # Panics
    ///
    /// Panics if the range is empty or includes values less than or equal to zero.
    pub fn scale_range(self, range: RangeInclusive<f32>) -> Self {
        assert!(
            *range.start() > 0.0 && range.start() <= range.end(),
            "invalid zoom range {range:?}"
        );
        Self {
            scale_range: range,
            ..self
        }
    }

    /// Sets the pair of landmarks whose distance drives the zoom factor.
    pub fn pinch(self, pinch: PinchPair) -> Self {
        Self { pinch, ..self }
    }

    /// Sets the color used to pad the zoomed view when zooming out.
    pub fn fill(self, fill: Color) -> Self {
        Self { fill, ..self }
    }

    #[inline]
    pub fn pinch_pair(&self) -> PinchPair {
        self.pinch
    }

    #[inline]
    pub fn fill_color(&self) -> Color {
        self.fill
    }
}
