//! Hand tracking: palm detection seeds a region of interest per hand, which landmark estimation
//! then follows from frame to frame.

use std::{
    path::Path,
    time::{Duration, Instant},
};

use crate::{
    detection::Detection,
    image::{Image, RotatedRect},
    timer::Timer,
};

use super::{
    detector::{HandDetector, LandmarkNetwork},
    palm::PalmDetector,
    HandDetection, MAX_HANDS,
};

/// Palm to hand grow factor.
const PALM_GROW: f32 = 1.5;

/// Tracks up to [`MAX_HANDS`] hands.
///
/// While fewer hands than that are tracked, the palm detector runs at most every
/// [`HandTracker::DEFAULT_REDETECT_INTERVAL`] to pick up new ones. Each tracked hand's RoI follows
/// its landmarks until the landmark network stops seeing a hand in it.
pub struct HandTracker {
    palm: PalmDetector,
    landmarks: LandmarkNetwork,
    rois: Vec<RotatedRect>,
    next_detection: Instant,
    redetect_interval: Duration,
    iou_thresh: f32,
    /// Palm detection and landmark estimation.
    timers: [Timer; 2],
}

impl HandTracker {
    /// Palms that overlap a tracked hand's RoI at least this much are considered the same hand.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub const DEFAULT_REDETECT_INTERVAL: Duration = Duration::from_millis(300);

    pub fn new(palm: PalmDetector, landmarks: LandmarkNetwork) -> Self {
        Self {
            palm,
            landmarks,
            rois: Vec::new(),
            next_detection: Instant::now(),
            redetect_interval: Self::DEFAULT_REDETECT_INTERVAL,
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            timers: [Timer::new("palm"), Timer::new("landmarks")],
        }
    }

    /// Loads the palm detection and hand landmark networks from `.onnx` files.
    pub fn load<P: AsRef<Path>, L: AsRef<Path>>(palm: P, landmarks: L) -> anyhow::Result<Self> {
        Ok(Self::new(
            PalmDetector::load(palm)?,
            LandmarkNetwork::load(landmarks)?,
        ))
    }

    fn redetect(&mut self, image: &Image) -> anyhow::Result<()> {
        let [t_palm, _] = &self.timers;
        let palms = t_palm.time(|| self.palm.detect(image))?;
        for palm in &palms {
            if self.rois.len() >= MAX_HANDS {
                break;
            }
            admit(&mut self.rois, hand_roi(palm), self.iou_thresh);
        }
        self.next_detection = Instant::now() + self.redetect_interval;
        Ok(())
    }
}

impl HandDetector for HandTracker {
    fn detect(&mut self, image: &Image) -> anyhow::Result<HandDetection> {
        if self.rois.len() < MAX_HANDS && (self.rois.is_empty() || Instant::now() >= self.next_detection) {
            self.redetect(image)?;
        }

        let [_, t_landmarks] = &self.timers;
        let mut hands = Vec::with_capacity(self.rois.len());
        let mut rois = Vec::with_capacity(self.rois.len());
        for roi in &self.rois {
            match t_landmarks.time(|| self.landmarks.track(image, *roi))? {
                // Two RoIs that have converged onto the same hand are merged.
                Some((hand, next)) => {
                    if admit(&mut rois, next, self.iou_thresh) {
                        hands.push(hand);
                    }
                }
                None => log::trace!("lost track of hand in {:?}", roi),
            }
        }
        self.rois = rois;

        Ok(HandDetection::new(hands))
    }

    fn timers(&self) -> &[Timer] {
        &self.timers
    }
}

/// Turns a palm detection into the RoI of the whole hand.
fn hand_roi(palm: &Detection) -> RotatedRect {
    RotatedRect::new(palm.bounding_rect().grow_rel(PALM_GROW), palm.angle())
}

/// Adds `roi` to `rois` unless it overlaps one of them by `iou_thresh` or more.
///
/// Returns whether `roi` was added.
fn admit(rois: &mut Vec<RotatedRect>, roi: RotatedRect, iou_thresh: f32) -> bool {
    if rois.iter().any(|other| other.rect().iou(roi.rect()) >= iou_thresh) {
        log::trace!("{:?} overlaps a tracked hand", roi);
        return false;
    }
    rois.push(roi);
    true
}

#[cfg(test)]
mod tests {
    use nalgebra::Point2;

    use super::*;
    use crate::image::BoundingRect;

    #[test]
    fn palm_grows_into_hand() {
        let mut palm = Detection::new(
            0.9,
            BoundingRect::from_center(50.0, 50.0, 10.0, 20.0),
            vec![Point2::new(50.0, 60.0); 7],
        );
        palm.set_angle(0.25);
        let roi = hand_roi(&palm);
        assert_eq!(roi.rect().center(), Point2::new(50.0, 50.0));
        assert_eq!((roi.rect().width(), roi.rect().height()), (40.0, 80.0));
        assert_eq!(roi.rotation_radians(), 0.25);
    }

    #[test]
    fn overlapping_rois_are_not_admitted() {
        let roi = |x| RotatedRect::from(BoundingRect::from_center(x, 0.0, 10.0, 10.0));
        let mut rois = Vec::new();
        assert!(admit(&mut rois, roi(0.0), HandTracker::DEFAULT_IOU_THRESH));
        assert!(!admit(&mut rois, roi(2.0), HandTracker::DEFAULT_IOU_THRESH));
        assert!(admit(&mut rois, roi(20.0), HandTracker::DEFAULT_IOU_THRESH));
        assert_eq!(rois.len(), 2);
    }
}
