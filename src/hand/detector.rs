//! Hand landmark detectors.

use std::path::Path;

use anyhow::{bail, Context};
use nalgebra::Point2;
use tract_onnx::prelude::TValue;

use crate::{
    image::{Image, Resolution, RotatedRect},
    nn::{self, Network},
    timer::Timer,
};

use super::{palm::upright_angle, HandDetection, HandLandmarks, LandmarkIdx};

/// Finds up to two hands in a camera frame.
pub trait HandDetector: Send {
    /// Detects hands in `image`.
    ///
    /// The returned landmarks are normalized to the dimensions of `image`.
    fn detect(&mut self, image: &Image) -> anyhow::Result<HandDetection>;

    /// Returns profiling timers to log along with the capture loop's frame rate.
    fn timers(&self) -> &[Timer] {
        &[]
    }
}

impl<D: HandDetector + ?Sized> HandDetector for Box<D> {
    fn detect(&mut self, image: &Image) -> anyhow::Result<HandDetection> {
        (**self).detect(image)
    }

    fn timers(&self) -> &[Timer] {
        (**self).timers()
    }
}

/// A detector that never finds anything.
///
/// Used when no landmark model is available, so that the camera view keeps working.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHands;

impl HandDetector for NoHands {
    fn detect(&mut self, _: &Image) -> anyhow::Result<HandDetection> {
        Ok(HandDetection::default())
    }
}

/// Runs the MediaPipe hand landmark network on a region of interest around one hand.
pub struct LandmarkNetwork {
    network: Network,
}

impl LandmarkNetwork {
    /// Landmarks with a lower presence score than this mean the hand was lost.
    pub const LOSS_THRESHOLD: f32 = 0.5;

    /// Relative margin added to each side of the landmarks' bounding box to get the next RoI.
    pub const ROI_PADDING: f32 = 0.3;

    /// Loads a hand landmark model from an `.onnx` file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            network: Network::load(path)?,
        })
    }

    /// Estimates the landmarks of the hand inside `roi`.
    ///
    /// Returns the landmarks, normalized to `image`, together with the RoI to use for the next
    /// frame. Returns `None` if the network reports that there is no hand in `roi`.
    pub fn track(
        &self,
        image: &Image,
        roi: RotatedRect,
    ) -> anyhow::Result<Option<(HandLandmarks, RotatedRect)>> {
        let input_res = self.network.input_resolution();
        let ratio = input_res
            .aspect_ratio()
            .context("hand landmark network has an empty input")?;
        let view = roi.grow_to_fit_aspect(ratio);
        let input = image.sample(&view, input_res);

        let outputs = self.network.infer(&input)?;
        let (screen, presence) = landmark_outputs(&outputs)?;

        log::trace!("hand presence in {:?}: {}", view, presence);
        if presence < Self::LOSS_THRESHOLD {
            return Ok(None);
        }

        let points = to_image(&view, input_res, screen);
        let angle = upright_angle(
            points[LandmarkIdx::Wrist as usize],
            points[LandmarkIdx::MiddleFingerMcp as usize],
        );
        let next_roi = RotatedRect::bounding(angle, points)
            .context("no landmarks")?
            .grow_rel(Self::ROI_PADDING);

        let (w, h) = (image.width() as f32, image.height() as f32);
        let hand = HandLandmarks::from_fn(presence, |idx| {
            let p = points[idx as usize];
            [p.x / w, p.y / h]
        });
        Ok(Some((hand, next_roi)))
    }
}

/// Splits the outputs of the hand landmark network into screen landmarks and hand presence.
///
/// The network has 4 outputs: screen landmarks, presence, handedness and world landmarks.
fn landmark_outputs(outputs: &[TValue]) -> anyhow::Result<(&[f32], f32)> {
    if outputs.len() != 4 {
        bail!("hand landmark model has {} outputs, expected 4", outputs.len());
    }
    let screen = nn::output(outputs, 0, HandLandmarks::NUM_LANDMARKS * 3)?;
    let presence = nn::output(outputs, 1, 1)?[0];
    Ok((screen, presence))
}

/// Maps landmarks from network input pixels to pixels of the image `view` was sampled from.
fn to_image(
    view: &RotatedRect,
    input_res: Resolution,
    screen: &[f32],
) -> [Point2<f32>; HandLandmarks::NUM_LANDMARKS] {
    let sx = view.rect().width() / input_res.width() as f32;
    let sy = view.rect().height() / input_res.height() as f32;
    std::array::from_fn(|i| {
        let (x, y) = (screen[i * 3], screen[i * 3 + 1]);
        view.transform_out(Point2::new(x * sx, y * sy))
    })
}
