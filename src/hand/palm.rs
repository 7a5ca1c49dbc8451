//! Palm detection.

use std::path::Path;

use anyhow::Context;
use nalgebra::{Point2, Rotation2, Vector2};

use crate::{
    detection::{
        nms::NonMaxSuppression,
        sigmoid,
        ssd::{Anchor, Anchors, LayerInfo},
        Detection,
    },
    image::{BoundingRect, Image, Resolution, RotatedRect},
    nn::{self, Network},
};

/// Palms with a lower detection score than this are discarded.
pub const MIN_PALM_SCORE: f32 = 0.7;

/// Output layers of the palm detection network.
const LAYERS: [LayerInfo; 2] = [LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

/// Box center and size, followed by 7 keypoints.
const BOX_PARAMS: usize = 4 + 2 * 7;

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

/// Runs the MediaPipe palm detection network on whole camera frames.
pub struct PalmDetector {
    network: Network,
    anchors: Anchors,
    nms: NonMaxSuppression,
}

impl PalmDetector {
    /// Loads the palm detection network from an `.onnx` file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let network = Network::load(path)?;
        Ok(Self {
            network,
            anchors: Anchors::calculate(&LAYERS),
            nms: NonMaxSuppression::new(),
        })
    }

    /// Finds palms in `image`, most confident first.
    ///
    /// Coordinates are in pixels of `image`.
    pub fn detect(&self, image: &Image) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.network.input_resolution();
        let ratio = input_res
            .aspect_ratio()
            .context("palm detection network has an empty input")?;

        // Pad the frame with black bars to the network's aspect ratio.
        let (w, h) = (image.width() as f32, image.height() as f32);
        let view = BoundingRect::from_top_left(0.0, 0.0, w, h).grow_to_fit_aspect(ratio);
        let input = image.sample(&RotatedRect::from(view), input_res);

        let outputs = self.network.infer(&input)?;
        let num_anchors = self.anchors.len();
        let boxes = nn::output(&outputs, 0, num_anchors * BOX_PARAMS)?;
        let scores = nn::output(&outputs, 1, num_anchors)?;

        let mut palms = extract(&self.anchors, input_res, boxes, scores);
        let mut palms = self.nms.process(&mut palms);

        let scale = view.width() / input_res.width() as f32;
        for palm in &mut palms {
            palm.scale_and_move(scale, view.x(), view.y());
        }
        log::trace!("palm detections: {:?}", palms);
        Ok(palms)
    }
}

/// Decodes all candidates scoring at least [`MIN_PALM_SCORE`].
///
/// Coordinates are in pixels of the network input.
fn extract(anchors: &Anchors, input_res: Resolution, boxes: &[f32], scores: &[f32]) -> Vec<Detection> {
    anchors
        .iter()
        .zip(boxes.chunks_exact(BOX_PARAMS))
        .zip(scores)
        .filter_map(|((anchor, params), &raw)| {
            let confidence = sigmoid(raw);
            (confidence >= MIN_PALM_SCORE).then(|| decode(anchor, input_res, params, confidence))
        })
        .collect()
}

fn decode(anchor: &Anchor, input_res: Resolution, params: &[f32], confidence: f32) -> Detection {
    let x_offset = anchor.x_center() * input_res.width() as f32;
    let y_offset = anchor.y_center() * input_res.height() as f32;

    let rect = BoundingRect::from_center(
        params[0] + x_offset,
        params[1] + y_offset,
        params[2],
        params[3],
    );
    let keypoints = params[4..]
        .chunks_exact(2)
        .map(|kp| Point2::new(kp[0] + x_offset, kp[1] + y_offset))
        .collect::<Vec<_>>();

    let wrist = keypoints[Keypoint::Wrist as usize];
    let finger = keypoints[Keypoint::MiddleFingerMcp as usize];
    let mut det = Detection::new(confidence, rect, keypoints);
    det.set_angle(upright_angle(wrist, finger));
    det
}

/// Computes the rotation of a hand whose fingers point from `wrist` towards `finger`.
///
/// A hand with its fingers pointing up has a rotation of 0.
pub(crate) fn upright_angle(wrist: Point2<f32>, finger: Point2<f32>) -> f32 {
    Rotation2::rotation_between(&Vector2::y(), &(wrist - finger)).angle()
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn anchor_count() {
        assert_eq!(Anchors::calculate(&LAYERS).len(), 2016);
    }

    #[test]
    fn upright() {
        let wrist = Point2::new(5.0, 10.0);
        assert_relative_eq!(upright_angle(wrist, Point2::new(5.0, 0.0)), 0.0);
        // Fingers pointing right: the hand's "up" is the image's right.
        assert_relative_eq!(
            upright_angle(wrist, Point2::new(15.0, 10.0)),
            FRAC_PI_2,
            epsilon = 1e-5
        );
    }

    #[test]
    fn extract_applies_score_threshold() {
        let anchors = Anchors::calculate(&[LayerInfo::new(1, 2, 1)]);
        let input_res = Resolution::new(100, 100);

        let mut boxes = vec![0.0; 2 * BOX_PARAMS];
        // Second anchor: box at (+5, -5) from the anchor center, wrist below the middle finger.
        let params = &mut boxes[BOX_PARAMS..];
        params[..4].copy_from_slice(&[5.0, -5.0, 20.0, 10.0]);
        params[4..6].copy_from_slice(&[0.0, 10.0]);
        params[8..10].copy_from_slice(&[0.0, -10.0]);

        // sigmoid(0.5) is about 0.62, sigmoid(2.0) about 0.88.
        let palms = extract(&anchors, input_res, &boxes, &[0.5, 2.0]);
        assert_eq!(palms.len(), 1);

        let palm = &palms[0];
        assert_relative_eq!(palm.confidence(), sigmoid(2.0));
        let rect = palm.bounding_rect();
        assert_eq!(rect.center(), Point2::new(80.0, 45.0));
        assert_eq!((rect.width(), rect.height()), (20.0, 10.0));
        assert_eq!(palm.keypoints().len(), 7);
        assert_eq!(palm.keypoints()[0], Point2::new(75.0, 60.0));
        assert_relative_eq!(palm.angle(), 0.0);
    }
}
