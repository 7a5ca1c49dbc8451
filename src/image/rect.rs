//! Sub-pixel rectangles, optionally rotated.
//!
//! These describe detections and regions of interest, which do not line up with the pixel grid.

use std::fmt;

use nalgebra::{Point2, Rotation2, Vector2};

use super::AspectRatio;

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Rectangles are allowed to have zero height and/or width.
#[derive(Clone, Copy, PartialEq)]
pub struct BoundingRect {
    center: Point2<f32>,
    size: Vector2<f32>,
}

impl BoundingRect {
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

    /// Computes the bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding(points: impl IntoIterator<Item = Point2<f32>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        Some(Self::from_top_left(min.x, min.y, max.x - min.x, max.y - min.y))
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.center
    }

    /// Returns the X coordinate of the left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.center.x - self.size.x * 0.5
    }

    /// Returns the Y coordinate of the top edge.
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
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Grows this rectangle by adding a margin relative to width and height.
    ///
    /// `amount` is the relative amount of the rectangle's width and height to add to each side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        Self {
            center: self.center,
            size: self.size * (1.0 + 2.0 * amount),
        }
    }

    /// Symmetrically extends one dimension of `self` so that the result has the given aspect
    /// ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target: AspectRatio) -> Self {
        let mut res = *self;
        let target_width = self.height() * target.as_f32();
        if target_width >= self.width() {
            res.size.x = target_width;
        } else {
            res.size.y = self.width() / target.as_f32();
        }
        res
    }

    fn intersection_area(&self, other: &Self) -> f32 {
        let w = (self.x() + self.width()).min(other.x() + other.width()) - self.x().max(other.x());
        let h = (self.y() + self.height()).min(other.y() + other.height()) - self.y().max(other.y());
        w.max(0.0) * h.max(0.0)
    }

    /// Computes the Intersection over Union (IoU) of `self` and `other`.
    ///
    /// Two empty rectangles have an IoU of 0.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

impl fmt::Debug for BoundingRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundingRect @ ({:.1}, {:.1}) {:.1}x{:.1}",
            self.x(),
            self.y(),
            self.width(),
            self.height()
        )
    }
}

/// A [`BoundingRect`], rotated around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: BoundingRect,
    radians: f32,
}

impl RotatedRect {
    /// Creates a new rotated rectangle.
    ///
    /// `radians` is the rotation of the rectangle's contents relative to the image: the rectangle's
    /// upwards direction points along the image's upwards direction rotated by `radians`.
    #[inline]
    pub fn new(rect: BoundingRect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Computes the rectangle with rotation `radians` that tightly encloses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding(radians: f32, points: impl IntoIterator<Item = Point2<f32>>) -> Option<Self> {
        // Rotate all points into the rectangle's frame, measure there, then rotate the center back.
        let into = Rotation2::new(-radians);
        let rotated = BoundingRect::bounding(points.into_iter().map(|p| into * p))?;
        let center = Rotation2::new(radians) * rotated.center();
        Some(Self::new(
            BoundingRect::from_center(center.x, center.y, rotated.width(), rotated.height()),
            radians,
        ))
    }

    /// Returns the underlying non-rotated rectangle.
    #[inline]
    pub fn rect(&self) -> &BoundingRect {
        &self.rect
    }

    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Applies a closure to the underlying non-rotated [`BoundingRect`].
    pub fn map(mut self, f: impl FnOnce(BoundingRect) -> BoundingRect) -> Self {
        self.rect = f(self.rect);
        self
    }

    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.map(|rect| rect.grow_rel(amount))
    }

    #[must_use]
    pub fn grow_to_fit_aspect(&self, target: AspectRatio) -> Self {
        self.map(|rect| rect.grow_to_fit_aspect(target))
    }

    /// Transforms a point from the rectangle's coordinate system to the parent system.
    ///
    /// The origin of the inner coordinate system is the rectangle's top left corner.
    pub fn transform_out(&self, pt: Point2<f32>) -> Point2<f32> {
        let half = Vector2::new(self.rect.width(), self.rect.height()) * 0.5;
        self.rect.center() + Rotation2::new(self.radians) * (pt.coords - half)
    }
}

impl From<BoundingRect> for RotatedRect {
    fn from(rect: BoundingRect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn grow() {
        let rect = BoundingRect::from_top_left(0.0, 0.0, 10.0, 4.0);
        let grown = rect.grow_rel(0.5);
        assert_eq!(grown.center(), rect.center());
        assert_eq!((grown.width(), grown.height()), (20.0, 8.0));

        let square = rect.grow_to_fit_aspect(AspectRatio::SQUARE);
        assert_eq!((square.width(), square.height()), (10.0, 10.0));
        assert_eq!((square.x(), square.y()), (0.0, -3.0));
    }

    #[test]
    fn iou() {
        let a = BoundingRect::from_top_left(0.0, 0.0, 2.0, 2.0);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&BoundingRect::from_top_left(1.0, 0.0, 2.0, 2.0)), 2.0 / 6.0);
        assert_eq!(a.iou(&BoundingRect::from_top_left(5.0, 5.0, 2.0, 2.0)), 0.0);

        let empty = BoundingRect::from_center(0.0, 0.0, 0.0, 0.0);
        assert_eq!(empty.iou(&empty), 0.0);
    }

    #[test]
    fn bounding() {
        let points = [[1.0, 5.0], [3.0, 2.0], [2.0, 4.0]].map(Point2::from);
        let rect = BoundingRect::bounding(points).unwrap();
        assert_eq!((rect.x(), rect.y()), (1.0, 2.0));
        assert_eq!((rect.width(), rect.height()), (2.0, 3.0));
        assert!(BoundingRect::bounding([]).is_none());
    }

    #[test]
    fn transform_out_rotates_around_center() {
        let rect = RotatedRect::new(BoundingRect::from_center(10.0, 10.0, 4.0, 2.0), FRAC_PI_2);

        // The inner "up" direction points towards +X in the parent.
        let top_center = rect.transform_out(Point2::new(2.0, 0.0));
        assert_relative_eq!(top_center.x, 11.0, epsilon = 1e-5);
        assert_relative_eq!(top_center.y, 10.0, epsilon = 1e-5);

        let unrotated = RotatedRect::from(*rect.rect());
        assert_eq!(unrotated.transform_out(Point2::new(0.0, 0.0)), Point2::new(8.0, 9.0));
    }

    #[test]
    fn rotated_bounding() {
        // A 6x2 strip lying along the Y axis, measured in a frame rotated by 90 degrees.
        let points = [[0.0, -3.0], [1.0, 3.0], [-1.0, 0.0]].map(Point2::from);
        let rect = RotatedRect::bounding(FRAC_PI_2, points).unwrap();
        assert_relative_eq!(rect.rect().width(), 6.0, epsilon = 1e-5);
        assert_relative_eq!(rect.rect().height(), 2.0, epsilon = 1e-5);
        assert_relative_eq!(rect.rect().center().x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(rect.rect().center().y, 0.0, epsilon = 1e-5);
        assert_eq!(rect.rotation_radians(), FRAC_PI_2);
    }
}
