//! Video input.

pub mod webcam;

use crate::{image::Image, timer::Timer, Result};

pub use webcam::{Webcam, WebcamOptions};

/// A source of camera frames.
///
/// Sources are opened and read on the capture thread, so they do not need to be [`Send`].
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    ///
    /// Returns [`Error::EndOfStream`][crate::Error::EndOfStream] once the source cannot produce
    /// any more frames.
    fn read(&mut self) -> Result<Image>;

    /// Returns profiling timers to log along with the capture loop's frame rate.
    fn timers(&self) -> &[Timer] {
        &[]
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read(&mut self) -> Result<Image> {
        (**self).read()
    }

    fn timers(&self) -> &[Timer] {
        (**self).timers()
    }
}
