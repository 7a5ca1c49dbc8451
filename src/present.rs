//! Hand-off of rendered frames from the capture loop to the display.
//!
//! The capture loop never touches the display directly. It packages its output into a
//! [`RenderCommand`] and publishes it into a shared [`DisplaySlot`], which only keeps the latest
//! one. The thread that owns the display is woken through a [`PresentationSink`] when the slot goes
//! from empty to filled, and takes the frame out of the slot when it draws. A display that falls
//! behind therefore skips frames instead of queueing them.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use crate::image::Image;

/// Status line shown before an image has been selected.
pub const STATUS_SELECT_IMAGE: &str = "Select an image to start.";
pub const STATUS_IMAGE_LOADED: &str = "Image loaded successfully.";
pub const STATUS_WEBCAM_STARTED: &str = "Webcam started.";

/// The output of one capture loop iteration.
///
/// Both images are immutable once the command is built.
#[derive(Debug, Clone)]
pub struct RenderCommand {
    /// The mirrored camera frame, with hand landmarks drawn on top.
    pub camera: Arc<Image>,
    /// The zoomed source image, or the camera frame if nothing has been zoomed yet.
    pub zoomed: Arc<Image>,
    /// The smoothed zoom factor at the time the frame was processed.
    pub scale: f32,
    /// The number of hands detected in the frame.
    pub hands: usize,
    /// Sequence number of the frame since the capture loop started.
    pub frame: u64,
}

/// Messages sent to the presentation side.
#[derive(Debug, Clone)]
pub enum Notice {
    /// A new frame has been published into the [`DisplaySlot`].
    ///
    /// At most one of these is outstanding at a time: no further one is posted until the display
    /// has taken the frame with [`DisplaySlot::snapshot`].
    FrameReady,
    /// The status line should change.
    Status(String),
}

/// Receiver of [`Notice`]s produced off the display thread.
///
/// Implementations must not block for long and must not run display code on the calling thread;
/// they only enqueue the notice for the display's own event loop.
pub trait PresentationSink: Send + Sync + 'static {
    /// Enqueues `notice` for presentation.
    ///
    /// Returns `false` if the display side has gone away and the notice was dropped.
    fn post(&self, notice: Notice) -> bool;
}

impl PresentationSink for crossbeam_channel::Sender<Notice> {
    fn post(&self, notice: Notice) -> bool {
        self.send(notice).is_ok()
    }
}

impl<S: PresentationSink + ?Sized> PresentationSink for Arc<S> {
    fn post(&self, notice: Notice) -> bool {
        (**self).post(notice)
    }
}

/// What is currently visible on screen.
#[derive(Debug, Clone)]
pub struct Displayed {
    /// The latest published frame, if any.
    pub frame: Option<RenderCommand>,
    pub status: String,
}

/// The most recently published frame and status line.
///
/// Camera frame and zoomed view are replaced together under a single lock, so a reader never
/// sees one without the other. Only the latest [`RenderCommand`] is kept.
#[derive(Debug)]
pub struct DisplaySlot {
    inner: Mutex<Displayed>,
    /// Set when a frame was published that the display has not taken yet.
    pending: AtomicBool,
}

impl DisplaySlot {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Displayed {
                frame: None,
                status: status.into(),
            }),
            pending: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Displayed> {
        // The slot only holds plain data, so a panic while holding the lock cannot leave it in a
        // state that is unsafe to read.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes `cmd` the visible frame, replacing any frame the display has not taken yet.
    ///
    /// Returns `true` if no frame was pending before, in which case the display has to be woken
    /// up with [`Notice::FrameReady`].
    pub fn publish(&self, cmd: RenderCommand) -> bool {
        self.lock().frame = Some(cmd);
        !self.pending.swap(true, Ordering::AcqRel)
    }

    pub fn set_status(&self, status: impl Into<String>) {
        self.lock().status = status.into();
    }

    /// Takes a copy of the visible state and marks the current frame as taken.
    ///
    /// The images are shared, not copied.
    pub fn snapshot(&self) -> Displayed {
        // Clear first: a frame published after this point re-arms the flag and wakes the display.
        self.pending.store(false, Ordering::Release);
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Color;

    fn command(color: Color, frame: u64) -> RenderCommand {
        let camera = Arc::new(Image::filled(2, 2, color));
        RenderCommand {
            zoomed: camera.clone(),
            camera,
            scale: 1.5,
            hands: 2,
            frame,
        }
    }

    #[test]
    fn latest_command_wins() {
        let slot = DisplaySlot::new(STATUS_SELECT_IMAGE);
        assert!(slot.snapshot().frame.is_none());

        slot.publish(command(Color::RED, 0));
        slot.publish(command(Color::GREEN, 1));

        let shown = slot.snapshot().frame.unwrap();
        assert_eq!(shown.frame, 1);
        assert_eq!(shown.camera.get(0, 0), Color::GREEN);
        assert_eq!(shown.zoomed.get(0, 0), Color::GREEN);
        assert_eq!(shown.scale, 1.5);
        assert_eq!(slot.snapshot().status, STATUS_SELECT_IMAGE);
    }

    #[test]
    fn wakes_once_per_taken_frame() {
        let slot = DisplaySlot::new("");
        assert!(slot.publish(command(Color::RED, 0)));
        assert!(!slot.publish(command(Color::RED, 1)));
        assert!(!slot.publish(command(Color::RED, 2)));

        assert_eq!(slot.snapshot().frame.unwrap().frame, 2);
        assert!(slot.publish(command(Color::RED, 3)));
    }

    #[test]
    fn status_survives_frames() {
        let slot = DisplaySlot::new("");
        slot.set_status("Webcam started.");
        slot.publish(command(Color::RED, 0));
        assert_eq!(slot.snapshot().status, "Webcam started.");
    }

    #[test]
    fn channel_sink() {
        let (tx, rx) = crossbeam_channel::unbounded();
        assert!(tx.post(Notice::Status("hi".into())));
        assert!(matches!(rx.recv(), Ok(Notice::Status(s)) if s == "hi"));
        drop(rx);
        assert!(!tx.post(Notice::FrameReady));
    }
}
