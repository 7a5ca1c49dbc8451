//! Hand landmarks and their detection.
//!
//! The detector itself is a black box behind the [`HandDetector`] trait; everything downstream of
//! it only sees [`HandDetection`]s in normalized image coordinates. [`HandTracker`] implements it
//! with palm detection followed by per-hand landmark tracking.

pub mod detector;
mod landmark;
pub mod palm;
mod tracking;

pub use detector::{HandDetector, LandmarkNetwork, NoHands};
pub use landmark::*;
pub use tracking::HandTracker;
