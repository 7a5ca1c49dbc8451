//! Zoom into a picture by pinching in front of a webcam.
//!
//! A background capture loop reads webcam frames, finds hands in them, and turns the distance
//! between thumb and index fingertip into a smoothed zoom factor. The selected image is rescaled
//! by that factor and handed to the window together with the annotated camera frame.
//!
//! Environment variables:
//!
//! - `PINCHZOOM_WEBCAM_NAME`: prefer the video device whose name contains this string.
//! - `PINCHZOOM_PALM_MODEL`: path to the ONNX palm detection model.
//! - `PINCHZOOM_HAND_MODEL`: path to the ONNX hand landmark model.
//! - `RUST_LOG`: log filter, see [`env_logger`].

pub mod detection;
pub mod error;
pub mod filter;
pub mod gui;
pub mod hand;
pub mod image;
pub mod nn;
pub mod pipeline;
pub mod present;
pub mod timer;
pub mod video;
pub mod zoom;

use log::LevelFilter;

pub use error::{Error, Result};

#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .filter(Some("tract_core"), LevelFilter::Warn)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and `pinchzoom` will log at *debug* level, unless `RUST_LOG` says otherwise.
///
/// `wgpu` and `tract` log at *warn* level.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
