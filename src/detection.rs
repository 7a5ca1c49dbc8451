//! Object detection output and post-processing.
//!
//! Single Shot MultiBox Detectors (SSDs) report one candidate per anchor. [`ssd`] computes the
//! anchors, and [`nms`] merges the many overlapping candidates that a single object produces.

pub mod nms;
pub mod ssd;

use nalgebra::Point2;

use crate::image::BoundingRect;

/// A detected object.
///
/// Consists of a rectangle enclosing the object, a confidence value between 0.0 and 1.0, the
/// object's rotation, and a list of keypoints whose meaning depends on the network.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: BoundingRect,
    keypoints: Vec<Point2<f32>>,
}

impl Detection {
    pub fn new(confidence: f32, rect: BoundingRect, keypoints: Vec<Point2<f32>>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the rotation of the object, in radians.
    ///
    /// See [`RotatedRect::new`][crate::image::RotatedRect::new] for the direction.
    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    #[inline]
    pub fn bounding_rect(&self) -> BoundingRect {
        self.rect
    }

    #[inline]
    pub fn keypoints(&self) -> &[Point2<f32>] {
        &self.keypoints
    }

    /// Scales all coordinates by `scale`, then moves them by `(dx, dy)`.
    pub fn scale_and_move(&mut self, scale: f32, dx: f32, dy: f32) {
        let map = |p: Point2<f32>| Point2::new(p.x * scale + dx, p.y * scale + dy);
        let center = map(self.rect.center());
        self.rect = BoundingRect::from_center(
            center.x,
            center.y,
            self.rect.width() * scale,
            self.rect.height() * scale,
        );
        for kp in &mut self.keypoints {
            *kp = map(*kp);
        }
    }
}

/// The logistic function, which maps raw network scores to confidences in `(0, 1)`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn sigmoid_range() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn scale_and_move() {
        let mut det = Detection::new(
            0.9,
            BoundingRect::from_center(10.0, 10.0, 4.0, 2.0),
            vec![Point2::new(9.0, 11.0)],
        );
        det.scale_and_move(2.0, 5.0, -5.0);
        let rect = det.bounding_rect();
        assert_relative_eq!(rect.center().x, 25.0);
        assert_relative_eq!(rect.center().y, 15.0);
        assert_relative_eq!(rect.width(), 8.0);
        assert_relative_eq!(rect.height(), 4.0);
        assert_eq!(det.keypoints(), &[Point2::new(23.0, 17.0)]);
    }
}
