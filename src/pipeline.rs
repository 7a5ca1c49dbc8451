//! The capture loop.
//!
//! [`CapturePipeline`] owns everything the loop needs: a way to open the video source, the hand
//! detector, the [`DisplaySlot`] that receives rendered frames, and the sink used to wake up the
//! display. Selecting an image starts the loop on its own thread; every iteration then reads a
//! frame, mirrors it, detects hands, updates the zoom factor, re-renders the zoomed view if needed,
//! and publishes both images.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};

use crate::{
    hand::{HandDetection, HandDetector, NoHands, MAX_HANDS},
    image::{draw, Color, Image},
    present::{DisplaySlot, Notice, RenderCommand, STATUS_WEBCAM_STARTED},
    timer::{FpsCounter, Timer},
    video::{FrameSource, Webcam, WebcamOptions},
    zoom::{PinchPair, ZoomCompositor, ZoomConfig, ZoomScaleTracker},
    Error, Result,
};

pub use crate::present::PresentationSink;

/// Opens the video source when the pipeline starts.
///
/// Called on the capture thread.
pub type SourceOpener = Arc<dyn Fn() -> anyhow::Result<Box<dyn FrameSource>> + Send + Sync>;

/// Configuration of a [`CapturePipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    zoom: ZoomConfig,
    thread_name: String,
    webcam: WebcamOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomConfig::default(),
            thread_name: "capture".into(),
            webcam: WebcamOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Sets the zoom gesture parameters.
    pub fn zoom(self, zoom: ZoomConfig) -> Self {
        Self { zoom, ..self }
    }

    /// Sets the name of the capture thread.
    pub fn thread_name(self, name: impl Into<String>) -> Self {
        Self {
            thread_name: name.into(),
            ..self
        }
    }

    /// Sets the options used by [`CapturePipeline::with_webcam`] to open the webcam.
    pub fn webcam(self, webcam: WebcamOptions) -> Self {
        Self { webcam, ..self }
    }

    #[inline]
    pub fn zoom_config(&self) -> &ZoomConfig {
        &self.zoom
    }
}

/// Whether a capture loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Active,
}

/// Asks a running capture loop to exit, from any thread.
///
/// Stopping is cooperative: the loop checks the flag before reading each frame, so a read that is
/// already blocked completes first.
#[derive(Debug, Clone)]
pub struct StopHandle {
    keep_running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.keep_running.store(false, Ordering::Relaxed);
    }
}

/// Image selections handed from the pipeline to its running capture loop.
#[derive(Default)]
struct Selections {
    /// The latest image selected since the loop last looked.
    pending: Option<Arc<Image>>,
    /// Set by the loop once it no longer picks up selections.
    closed: bool,
}

type SharedSelections = Arc<Mutex<Selections>>;

fn lock(selections: &Mutex<Selections>) -> MutexGuard<'_, Selections> {
    selections.lock().unwrap_or_else(|e| e.into_inner())
}

struct Running {
    selections: SharedSelections,
    /// Hands the detector back when the loop exits, so the pipeline can be restarted.
    thread: JoinHandle<Box<dyn HandDetector>>,
}

/// Runs the capture, detection and zoom loop and feeds a [`DisplaySlot`].
pub struct CapturePipeline {
    config: PipelineConfig,
    open: SourceOpener,
    detector: Option<Box<dyn HandDetector>>,
    display: Arc<DisplaySlot>,
    sink: Arc<dyn PresentationSink>,
    image: Option<Arc<Image>>,
    keep_running: Arc<AtomicBool>,
    running: Option<Running>,
}

impl CapturePipeline {
    /// Creates an idle pipeline.
    ///
    /// `open` is called on the capture thread every time the capture loop is started and has to
    /// return a fresh video source. Rendered frames are published into `display`, and `sink` is
    /// sent a [`Notice::FrameReady`] whenever `display` goes from having no pending frame to
    /// having one.
    pub fn new<F, D, S>(
        config: PipelineConfig,
        open: F,
        detector: D,
        display: Arc<DisplaySlot>,
        sink: S,
    ) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn FrameSource>> + Send + Sync + 'static,
        D: HandDetector + 'static,
        S: PresentationSink,
    {
        Self {
            config,
            open: Arc::new(open),
            detector: Some(Box::new(detector)),
            display,
            sink: Arc::new(sink),
            image: None,
            keep_running: Arc::new(AtomicBool::new(false)),
            running: None,
        }
    }

    /// Creates an idle pipeline that captures from the webcam configured in `config`.
    pub fn with_webcam<D, S>(
        config: PipelineConfig,
        detector: D,
        display: Arc<DisplaySlot>,
        sink: S,
    ) -> Self
    where
        D: HandDetector + 'static,
        S: PresentationSink,
    {
        let options = config.webcam.clone();
        let open = move || -> anyhow::Result<Box<dyn FrameSource>> {
            Ok(Box::new(Webcam::open(&options)?))
        };
        Self::new(config, open, detector, display, sink)
    }

    pub fn state(&self) -> PipelineState {
        match &self.running {
            Some(running) if !running.thread.is_finished() => PipelineState::Active,
            _ => PipelineState::Idle,
        }
    }

    /// Returns the currently selected source image.
    pub fn image(&self) -> Option<&Arc<Image>> {
        self.image.as_ref()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            keep_running: self.keep_running.clone(),
        }
    }

    /// Makes `image` the image to zoom into and resets the zoom gesture.
    ///
    /// If no capture loop is running, the video source is opened and a loop is started. If that
    /// fails, [`Error::DeviceUnavailable`] is returned (and reported to the sink) and the pipeline
    /// stays idle. If a loop is already running, it switches over to the new image; should its
    /// video stream end before it gets to do that, the loop reopens the source for the new image.
    pub fn select_image(&mut self, image: Arc<Image>) -> Result<()> {
        log::info!("selected {}x{} source image", image.width(), image.height());
        self.image = Some(image.clone());

        if let Some(running) = &self.running {
            if self.keep_running.load(Ordering::Relaxed) {
                let mut selections = lock(&running.selections);
                if !selections.closed {
                    selections.pending = Some(image);
                    return Ok(());
                }
            }
        }

        // Either nothing is running or the loop is on its way out; reap it before restarting.
        self.join();
        self.start(image)
    }

    fn start(&mut self, image: Arc<Image>) -> Result<()> {
        let detector = self.detector.take().unwrap_or_else(|| Box::new(NoHands));
        self.keep_running.store(true, Ordering::Relaxed);
        let selections = SharedSelections::default();
        let zoom = &self.config.zoom;
        let capture = CaptureLoop {
            detector,
            display: self.display.clone(),
            sink: self.sink.clone(),
            tracker: ZoomScaleTracker::new(zoom),
            compositor: ZoomCompositor::from_config(zoom),
            pinch: zoom.pinch_pair(),
            image: Some(image),
            zoomed: None,
            keep_running: self.keep_running.clone(),
            selections: selections.clone(),
            frame: 0,
            t_compose: Timer::new("compose"),
        };

        // Sources are not `Send`, so the source is opened on the capture thread.
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let open = self.open.clone();
        let thread = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                let source = match open() {
                    Ok(source) => source,
                    Err(e) => {
                        ready_tx.send(Err(e)).ok();
                        return capture.detector;
                    }
                };
                capture
                    .sink
                    .post(Notice::Status(STATUS_WEBCAM_STARTED.into()));
                ready_tx.send(Ok(())).ok();
                capture.run(source, &*open)
            })
            .map_err(|e| {
                log::error!("failed to spawn capture thread: {}", e);
                Error::Spawn(e)
            })?;

        self.running = Some(Running { selections, thread });

        let err = match ready_rx.recv() {
            Ok(Ok(())) => {
                log::debug!("started capture thread '{}'", self.config.thread_name);
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(_) => anyhow::anyhow!("capture thread exited while opening the video source"),
        };

        log::error!("failed to open video source: {:#}", err);
        self.join();
        let err = Error::DeviceUnavailable(err);
        self.sink.post(Notice::Status(err.status_message().into()));
        Err(err)
    }

    /// Stops the capture loop and waits for it to exit, releasing the video source.
    ///
    /// Does nothing if the pipeline is idle.
    pub fn stop(&mut self) {
        self.keep_running.store(false, Ordering::Relaxed);
        self.join();
    }

    fn join(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        self.keep_running.store(false, Ordering::Relaxed);
        match running.thread.join() {
            Ok(detector) => self.detector = Some(detector),
            Err(_) => log::error!("capture thread panicked; continuing without hand detection"),
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the capture thread.
struct CaptureLoop {
    detector: Box<dyn HandDetector>,
    display: Arc<DisplaySlot>,
    sink: Arc<dyn PresentationSink>,
    tracker: ZoomScaleTracker,
    compositor: ZoomCompositor,
    pinch: PinchPair,
    image: Option<Arc<Image>>,
    zoomed: Option<Arc<Image>>,
    keep_running: Arc<AtomicBool>,
    selections: SharedSelections,
    frame: u64,
    t_compose: Timer,
}

impl CaptureLoop {
    fn run(
        mut self,
        mut source: Box<dyn FrameSource>,
        open: &(dyn Fn() -> anyhow::Result<Box<dyn FrameSource>> + Send + Sync),
    ) -> Box<dyn HandDetector> {
        loop {
            self.capture(source);

            let Some(image) = self.close() else {
                break;
            };

            // The stream ended with a selection still pending, so start over for that image.
            log::info!("reopening video source for newly selected image");
            self.switch_to(image);
            source = match open() {
                Ok(source) => source,
                Err(e) => {
                    log::error!("failed to reopen video source: {:#}", e);
                    let err = Error::DeviceUnavailable(e);
                    self.sink.post(Notice::Status(err.status_message().into()));
                    self.keep_running.store(false, Ordering::Relaxed);
                    lock(&self.selections).closed = true;
                    break;
                }
            };
            self.sink
                .post(Notice::Status(STATUS_WEBCAM_STARTED.into()));
        }

        log::debug!("capture loop exiting after {} frames", self.frame);
        self.detector
    }

    /// Processes frames from `source` until it ends, the display goes away, or the loop is stopped.
    fn capture(&mut self, mut source: Box<dyn FrameSource>) {
        let mut fps = FpsCounter::new("capture");

        while self.keep_running.load(Ordering::Relaxed) {
            self.apply_selections();

            let frame = match source.read() {
                Ok(frame) => frame,
                Err(e) => {
                    log::info!("{}, stopping capture", e);
                    break;
                }
            };

            let result = catch_unwind(AssertUnwindSafe(|| self.process(frame)));
            match result {
                Ok(Ok(cmd)) => {
                    if self.display.publish(cmd) && !self.sink.post(Notice::FrameReady) {
                        log::info!("display is gone, stopping capture");
                        self.keep_running.store(false, Ordering::Relaxed);
                    }
                }
                Ok(Err(e)) => log::error!("dropping frame {}: {:#}", self.frame, e),
                Err(_) => log::error!("panic while processing frame {}, dropping it", self.frame),
            }
            self.frame += 1;

            fps.tick_with(
                source
                    .timers()
                    .iter()
                    .chain(self.detector.timers())
                    .chain([&self.t_compose]),
            );
        }
    }

    /// Stops accepting selections, unless one is pending after the stream ended on its own.
    ///
    /// Returns that pending selection.
    fn close(&self) -> Option<Arc<Image>> {
        let mut selections = lock(&self.selections);
        if self.keep_running.load(Ordering::Relaxed) {
            if let Some(image) = selections.pending.take() {
                return Some(image);
            }
        } else if selections.pending.take().is_some() {
            log::debug!("capture stopped, discarding pending image selection");
        }
        selections.closed = true;
        None
    }

    fn apply_selections(&mut self) {
        let pending = lock(&self.selections).pending.take();
        if let Some(image) = pending {
            self.switch_to(image);
        }
    }

    fn switch_to(&mut self, image: Arc<Image>) {
        log::debug!("capture loop switching to {}x{} image", image.width(), image.height());
        self.image = Some(image);
        self.tracker.reset();
        self.zoomed = None;
    }

    fn process(&mut self, mut frame: Image) -> anyhow::Result<RenderCommand> {
        frame.flip_horizontal_in_place();

        let detection = self.detector.detect(&frame)?;
        detection.draw(&mut frame);

        if detection.len() == MAX_HANDS {
            match self.pinch.distance(&detection, 0) {
                Ok(distance) => {
                    self.tracker.update(distance);
                    self.draw_pinch(&detection, &mut frame);
                }
                Err(e) => log::warn!("skipping zoom update: {}", e),
            }
        }

        if let Some(image) = &self.image {
            if let Some(scale) = self.tracker.take_recompose() {
                match self.t_compose.time(|| self.compositor.compose(image, scale)) {
                    Ok(zoomed) => self.zoomed = Some(Arc::new(zoomed)),
                    Err(e) => log::warn!("skipping recomposition: {}", e),
                }
            }
        }

        let camera = Arc::new(frame);
        let zoomed = self.zoomed.clone().unwrap_or_else(|| camera.clone());
        Ok(RenderCommand {
            camera,
            zoomed,
            scale: self.tracker.scale(),
            hands: detection.len(),
            frame: self.frame,
        })
    }

    /// Highlights the measured pinch span of hand 0.
    fn draw_pinch(&self, detection: &HandDetection, frame: &mut Image) {
        let Some(hand) = detection.hand(0) else {
            return;
        };
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let (a, b) = self.pinch.landmarks();
        let (a, b) = (hand.position(a), hand.position(b));
        draw::line(
            frame,
            (a.x * w).round() as i32,
            (a.y * h).round() as i32,
            (b.x * w).round() as i32,
            (b.y * h).round() as i32,
        )
        .color(Color::YELLOW)
        .stroke_width(2);
    }
}
