//! Error types shared by the zoom pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type used throughout `pinchzoom`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the capture pipeline and its stages.
#[derive(Debug, Error)]
pub enum Error {
    /// An image file could not be read or decoded.
    #[error("failed to load image '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The video capture device could not be opened.
    #[error("video device unavailable: {0}")]
    DeviceUnavailable(#[source] anyhow::Error),

    /// The capture thread could not be started.
    #[error("failed to spawn capture thread")]
    Spawn(#[source] std::io::Error),

    /// The video device stopped producing frames.
    #[error("video stream ended")]
    EndOfStream,

    /// A hand index was requested that the detection result does not contain.
    #[error("no hand with index {hand_index} (detected {hands} hands)")]
    InsufficientLandmarks { hand_index: usize, hands: usize },

    /// A zoom factor that is zero, negative, or not finite.
    #[error("invalid zoom scale {0}")]
    InvalidScale(f32),
}

impl Error {
    /// Returns the message to show in the status line for this error.
    pub fn status_message(&self) -> &'static str {
        match self {
            Error::Load { .. } => "Failed to load image.",
            Error::DeviceUnavailable(_) => "Could not open webcam.",
            Error::Spawn(_) => "Could not start capture.",
            Error::EndOfStream => "Webcam stream ended.",
            Error::InsufficientLandmarks { .. } | Error::InvalidScale(_) => "Hand tracking error.",
        }
    }
}
