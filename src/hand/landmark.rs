//! Hand landmark data.

use nalgebra::Point2;

use crate::image::{draw, Color, Image};

/// The maximum number of hands a [`HandDetection`] holds.
pub const MAX_HANDS: usize = 2;

/// Landmarks of one detected hand.
///
/// Positions are normalized to the input image: `(0, 0)` is the top left corner and `(1, 1)` the
/// bottom right corner.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    positions: [Point2<f32>; HandLandmarks::NUM_LANDMARKS],
    presence: f32,
}

impl HandLandmarks {
    pub const NUM_LANDMARKS: usize = 21;

    /// Creates a set of landmarks by computing each position from its [`LandmarkIdx`].
    pub fn from_fn(presence: f32, mut f: impl FnMut(LandmarkIdx) -> [f32; 2]) -> Self {
        Self {
            positions: std::array::from_fn(|i| Point2::from(f(LandmarkIdx::ALL[i]))),
            presence,
        }
    }

    /// Returns the normalized position of a landmark.
    #[inline]
    pub fn position(&self, index: LandmarkIdx) -> Point2<f32> {
        self.positions[index as usize]
    }

    pub fn positions(&self) -> &[Point2<f32>] {
        &self.positions
    }

    /// Returns the detector's confidence that this is actually a hand.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Draws the hand skeleton onto `target`, scaling the normalized positions to its size.
    pub fn draw(&self, target: &mut Image) {
        let (w, h) = (target.width() as f32, target.height() as f32);
        let px = |p: Point2<f32>| ((p.x * w).round() as i32, (p.y * h).round() as i32);

        for (a, b) in CONNECTIVITY {
            let (ax, ay) = px(self.position(*a));
            let (bx, by) = px(self.position(*b));
            draw::line(target, ax, ay, bx, by).color(Color::GREEN);
        }
        for pos in self.positions() {
            let (x, y) = px(*pos);
            draw::marker(target, x, y);
        }
    }
}

/// The hands found in one camera frame.
///
/// Holds at most [`MAX_HANDS`] hands, in the order the detector reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandDetection {
    hands: Vec<HandLandmarks>,
}

impl HandDetection {
    /// Creates a detection result from a list of hands.
    ///
    /// Hands beyond the first [`MAX_HANDS`] are discarded.
    pub fn new(mut hands: Vec<HandLandmarks>) -> Self {
        if hands.len() > MAX_HANDS {
            log::trace!("discarding {} extra hands", hands.len() - MAX_HANDS);
            hands.truncate(MAX_HANDS);
        }
        Self { hands }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    pub fn hand(&self, index: usize) -> Option<&HandLandmarks> {
        self.hands.get(index)
    }

    /// Draws every detected hand onto `target`.
    pub fn draw(&self, target: &mut Image) {
        for hand in &self.hands {
            hand.draw(target);
        }
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl LandmarkIdx {
    /// All landmarks, in the order the landmark network outputs them.
    pub const ALL: [LandmarkIdx; HandLandmarks::NUM_LANDMARKS] = {
        use LandmarkIdx::*;
        [
            Wrist,
            ThumbCmc,
            ThumbMcp,
            ThumbIp,
            ThumbTip,
            IndexFingerMcp,
            IndexFingerPip,
            IndexFingerDip,
            IndexFingerTip,
            MiddleFingerMcp,
            MiddleFingerPip,
            MiddleFingerDip,
            MiddleFingerTip,
            RingFingerMcp,
            RingFingerPip,
            RingFingerDip,
            RingFingerTip,
            PinkyMcp,
            PinkyPip,
            PinkyDip,
            PinkyTip,
        ]
    };
}

const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};
