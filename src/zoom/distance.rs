//! Pinch span measurement.

use crate::{
    hand::{HandDetection, LandmarkIdx},
    Error, Result,
};

/// Two landmarks of the same hand whose distance is the pinch span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinchPair {
    a: LandmarkIdx,
    b: LandmarkIdx,
}

impl Default for PinchPair {
    /// Thumb tip and index finger tip.
    fn default() -> Self {
        Self::new(LandmarkIdx::ThumbTip, LandmarkIdx::IndexFingerTip)
    }
}

impl PinchPair {
    pub const fn new(a: LandmarkIdx, b: LandmarkIdx) -> Self {
        Self { a, b }
    }

    #[inline]
    pub fn landmarks(&self) -> (LandmarkIdx, LandmarkIdx) {
        (self.a, self.b)
    }

    /// Computes the Euclidean distance between the two landmarks of hand `hand_index`.
    ///
    /// The distance is measured in normalized image coordinates, so it also depends on how large
    /// the hand appears in the frame.
    pub fn distance(&self, detection: &HandDetection, hand_index: usize) -> Result<f32> {
        let hand = detection
            .hand(hand_index)
            .ok_or(Error::InsufficientLandmarks {
                hand_index,
                hands: detection.len(),
            })?;
        Ok(nalgebra::distance(
            &hand.position(self.a),
            &hand.position(self.b),
        ))
    }
}

/// Computes the distance between thumb tip and index finger tip of hand `hand_index`.
pub fn distance(detection: &HandDetection, hand_index: usize) -> Result<f32> {
    PinchPair::default().distance(detection, hand_index)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::hand::HandLandmarks;

    fn pinching(thumb: [f32; 2], index: [f32; 2]) -> HandLandmarks {
        HandLandmarks::from_fn(1.0, |idx| match idx {
            LandmarkIdx::ThumbTip => thumb,
            LandmarkIdx::IndexFingerTip => index,
            _ => [0.5, 0.5],
        })
    }

    #[test]
    fn thumb_to_index() {
        let detection = HandDetection::new(vec![pinching([0.1, 0.1], [0.4, 0.5])]);
        assert_relative_eq!(distance(&detection, 0).unwrap(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn uses_selected_hand() {
        let detection = HandDetection::new(vec![
            pinching([0.0, 0.0], [0.0, 0.2]),
            pinching([0.0, 0.0], [0.0, 0.6]),
        ]);
        assert_relative_eq!(distance(&detection, 0).unwrap(), 0.2, epsilon = 1e-6);
        assert_relative_eq!(distance(&detection, 1).unwrap(), 0.6, epsilon = 1e-6);
    }

    #[test]
    fn custom_pair() {
        let pair = PinchPair::new(LandmarkIdx::ThumbTip, LandmarkIdx::Wrist);
        let detection = HandDetection::new(vec![pinching([0.5, 0.1], [0.9, 0.9])]);
        assert_relative_eq!(pair.distance(&detection, 0).unwrap(), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn missing_hand() {
        let detection = HandDetection::new(vec![pinching([0.0, 0.0], [1.0, 1.0])]);
        match distance(&detection, 1) {
            Err(Error::InsufficientLandmarks { hand_index, hands }) => {
                assert_eq!(hand_index, 1);
                assert_eq!(hands, 1);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(distance(&HandDetection::default(), 0).is_err());
    }
}
