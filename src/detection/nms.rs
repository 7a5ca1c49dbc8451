//! Non-Maximum Averaging.
//!
//! SSDs produce many overlapping detections for each object. Classic Non-Maximum Suppression keeps
//! only the most confident one of each overlapping group. This module instead replaces each group
//! with its confidence-weighted average, which jitters less from frame to frame.

use nalgebra::{Point2, Vector2};

use crate::image::BoundingRect;

use super::Detection;

/// Merges overlapping detections into their confidence-weighted average.
#[derive(Debug, Clone)]
pub struct NonMaxSuppression {
    iou_thresh: f32,
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
        }
    }

    /// Processes `detections`, returning one detection per group of overlapping ones.
    ///
    /// The result is ordered by descending confidence of each group's most confident detection,
    /// which also provides the merged detection's confidence and angle. `detections` is left
    /// empty.
    pub fn process(&self, detections: &mut Vec<Detection>) -> Vec<Detection> {
        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by(|a, b| a.confidence().total_cmp(&b.confidence()));

        let mut out = Vec::new();
        while let Some(seed) = detections.pop() {
            let mut group = vec![seed];
            detections.retain(|other| {
                if group[0].bounding_rect().iou(&other.bounding_rect()) >= self.iou_thresh {
                    group.push(other.clone());
                    false
                } else {
                    true
                }
            });
            out.push(average(&group));
        }
        out
    }
}

fn average(group: &[Detection]) -> Detection {
    let seed = &group[0];
    let mut center = Vector2::zeros();
    let mut size = Vector2::zeros();
    let mut keypoints = vec![Vector2::zeros(); seed.keypoints().len()];
    let mut divisor = 0.0;

    for det in group {
        if det.keypoints().len() != keypoints.len() {
            log::warn!("skipping detection with a different keypoint count in average");
            continue;
        }
        let factor = det.confidence();
        divisor += factor;
        let rect = det.bounding_rect();
        center += rect.center().coords * factor;
        size += Vector2::new(rect.width(), rect.height()) * factor;
        for (acc, kp) in keypoints.iter_mut().zip(det.keypoints()) {
            *acc += kp.coords * factor;
        }
    }

    if divisor <= 0.0 {
        return seed.clone();
    }
    center /= divisor;
    size /= divisor;
    let rect = BoundingRect::from_center(center.x, center.y, size.x, size.y);
    let keypoints = keypoints
        .into_iter()
        .map(|kp| Point2::from(kp / divisor))
        .collect();

    let mut avg = Detection::new(seed.confidence(), rect, keypoints);
    avg.set_angle(seed.angle());
    avg
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn det(confidence: f32, x: f32, keypoint: f32) -> Detection {
        Detection::new(
            confidence,
            BoundingRect::from_center(x, 0.0, 1.0, 1.0),
            vec![Point2::new(keypoint, 0.0)],
        )
    }

    #[test]
    fn averages_overlapping() {
        let nms = NonMaxSuppression::new();
        let mut detections = vec![det(0.25, 0.2, 1.0), det(0.75, 0.0, 3.0)];
        let merged = nms.process(&mut detections);
        assert!(detections.is_empty());
        assert_eq!(merged.len(), 1);

        let d = &merged[0];
        assert_eq!(d.confidence(), 0.75);
        assert_relative_eq!(d.bounding_rect().center().x, 0.05, epsilon = 1e-6);
        assert_relative_eq!(d.keypoints()[0].x, 2.5, epsilon = 1e-6);
    }

    #[test]
    fn ignores_nonoverlapping() {
        let nms = NonMaxSuppression::new();
        let merged = nms.process(&mut vec![det(0.6, 0.0, 0.0), det(0.9, 5.0, 0.0)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].confidence(), 0.9);
        assert_eq!(merged[1].confidence(), 0.6);
    }
}
