//! Anchor generation for Single Shot MultiBox Detectors (SSDs).
//!
//! Only covers what the palm detection network needs: fixed-size anchors centered on each cell of
//! each output feature map.

use crate::image::Resolution;

/// An anchor of an SSD network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    // values range from 0 to 1
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    /// Number of anchors per feature map cell. Must be non-zero.
    boxes_per_cell: u32,
    /// Feature map resolution of this layer.
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    ///
    /// # Panics
    ///
    /// Panics if `boxes_per_cell` is zero.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell != 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// The anchors of all output layers, in the order the network reports them.
#[derive(Debug, Clone)]
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut anchors = Vec::new();

        for layer in layers {
            let (width, height) = (layer.resolution.width(), layer.resolution.height());
            for y in 0..height {
                for x in 0..width {
                    let x_center = (x as f32 + 0.5) / width as f32;
                    let y_center = (y as f32 + 0.5) / height as f32;
                    // All boxes of a cell share its center; they differ only in their size prior,
                    // which the palm network already folds into its output.
                    for _ in 0..layer.boxes_per_cell {
                        anchors.push(Anchor { x_center, y_center });
                    }
                }
            }
        }

        Self { anchors }
    }

    /// Returns the total number of anchors.
    #[inline]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> + '_ {
        self.anchors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_centers() {
        let anchors = Anchors::calculate(&[LayerInfo::new(2, 2, 1), LayerInfo::new(1, 1, 1)]);
        assert_eq!(anchors.len(), 5);
        let anchors = anchors.iter().copied().collect::<Vec<_>>();
        assert_eq!(anchors[0], anchors[1]);
        assert_eq!((anchors[0].x_center(), anchors[0].y_center()), (0.25, 0.5));
        assert_eq!((anchors[2].x_center(), anchors[2].y_center()), (0.75, 0.5));
        assert_eq!((anchors[4].x_center(), anchors[4].y_center()), (0.5, 0.5));
    }
}
