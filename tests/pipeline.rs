use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use approx::assert_relative_eq;
use crossbeam_channel::{Receiver, Sender};
use pinchzoom::{
    hand::{HandDetection, HandDetector, HandLandmarks, LandmarkIdx, NoHands},
    image::{Color, Image, Resolution},
    pipeline::{CapturePipeline, PipelineConfig, PipelineState, PresentationSink},
    present::{DisplaySlot, Notice, RenderCommand, STATUS_WEBCAM_STARTED},
    video::FrameSource,
    Error, Result,
};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Yields a fixed list of frames, then reports the end of the stream.
struct Scripted(VecDeque<Image>);

impl FrameSource for Scripted {
    fn read(&mut self) -> Result<Image> {
        self.0.pop_front().ok_or(Error::EndOfStream)
    }
}

/// Yields the same frame forever.
struct Endless(Image);

impl FrameSource for Endless {
    fn read(&mut self) -> Result<Image> {
        thread::sleep(Duration::from_millis(2));
        Ok(self.0.clone())
    }
}

/// Yields the frames sent to it, and reports every call to `read` before blocking.
struct Fed {
    frames: Receiver<Image>,
    reads: Sender<()>,
}

impl FrameSource for Fed {
    fn read(&mut self) -> Result<Image> {
        self.reads.send(()).ok();
        self.frames.recv().map_err(|_| Error::EndOfStream)
    }
}

/// Returns a list of detections, one per frame, then cycles through it again.
struct ScriptedHands {
    script: Vec<HandDetection>,
    next: usize,
}

impl ScriptedHands {
    fn new(script: Vec<HandDetection>) -> Self {
        Self { script, next: 0 }
    }
}

impl HandDetector for ScriptedHands {
    fn detect(&mut self, _: &Image) -> anyhow::Result<HandDetection> {
        let detection = self.script[self.next % self.script.len()].clone();
        self.next += 1;
        Ok(detection)
    }
}

/// Finds nothing, except that its second call fails and its third call panics.
struct Faulty {
    calls: usize,
}

impl HandDetector for Faulty {
    fn detect(&mut self, _: &Image) -> anyhow::Result<HandDetection> {
        self.calls += 1;
        match self.calls {
            2 => anyhow::bail!("inference failed"),
            3 => panic!("detector crashed"),
            _ => Ok(HandDetection::default()),
        }
    }
}

/// What the display was asked to show.
#[derive(Debug)]
enum Shown {
    Frame(RenderCommand),
    Status(String),
}

/// A display that takes every frame out of its slot as soon as it is woken up.
struct Recorder {
    display: Arc<DisplaySlot>,
    shown: Sender<Shown>,
}

impl PresentationSink for Recorder {
    fn post(&self, notice: Notice) -> bool {
        let shown = match notice {
            Notice::FrameReady => match self.display.snapshot().frame {
                Some(cmd) => Shown::Frame(cmd),
                None => return true,
            },
            Notice::Status(status) => Shown::Status(status),
        };
        self.shown.send(shown).is_ok()
    }
}

fn pipeline<F, D>(config: PipelineConfig, open: F, detector: D) -> (CapturePipeline, Receiver<Shown>)
where
    F: Fn() -> anyhow::Result<Box<dyn FrameSource>> + Send + Sync + 'static,
    D: HandDetector + 'static,
{
    let display = Arc::new(DisplaySlot::new(""));
    let (tx, rx) = crossbeam_channel::unbounded();
    let recorder = Recorder {
        display: display.clone(),
        shown: tx,
    };
    let pipeline = CapturePipeline::new(config, open, detector, display, recorder);
    (pipeline, rx)
}

/// Two hands whose thumb and index fingertips are `span` apart.
fn two_hands(span: f32) -> HandDetection {
    let hand = HandLandmarks::from_fn(1.0, |idx| match idx {
        LandmarkIdx::ThumbTip => [0.3, 0.5],
        LandmarkIdx::IndexFingerTip => [0.3 + span, 0.5],
        _ => [0.5, 0.5],
    });
    HandDetection::new(vec![hand.clone(), hand])
}

/// A frame whose left half is red and right half is blue.
fn split_frame() -> Image {
    let mut frame = Image::filled(64, 48, Color::RED);
    frame.blit(&Image::filled(32, 48, Color::BLUE), 32, 0);
    frame
}

fn scripted(frames: Vec<Image>) -> impl Fn() -> anyhow::Result<Box<dyn FrameSource>> {
    move || -> anyhow::Result<Box<dyn FrameSource>> {
        Ok(Box::new(Scripted(frames.clone().into())))
    }
}

fn endless(frame: Image) -> impl Fn() -> anyhow::Result<Box<dyn FrameSource>> {
    move || -> anyhow::Result<Box<dyn FrameSource>> { Ok(Box::new(Endless(frame.clone()))) }
}

fn expect_status(rx: &Receiver<Shown>, expected: &str) {
    match rx.recv_timeout(TIMEOUT) {
        Ok(Shown::Status(status)) => assert_eq!(status, expected),
        other => panic!("expected status '{expected}', got {other:?}"),
    }
}

fn expect_frame(rx: &Receiver<Shown>) -> RenderCommand {
    match rx.recv_timeout(TIMEOUT) {
        Ok(Shown::Frame(cmd)) => cmd,
        other => panic!("expected frame, got {other:?}"),
    }
}

fn wait_until_idle(pipeline: &CapturePipeline) {
    let start = Instant::now();
    while pipeline.state() != PipelineState::Idle {
        assert!(start.elapsed() < TIMEOUT, "capture loop did not stop");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn mirrors_frames_and_ends_with_stream() {
    let frames = vec![split_frame(); 3];
    let (mut pipeline, rx) = pipeline(PipelineConfig::default(), scripted(frames), NoHands);
    assert_eq!(pipeline.state(), PipelineState::Idle);

    pipeline
        .select_image(Arc::new(Image::filled(20, 20, Color::GREEN)))
        .unwrap();
    expect_status(&rx, STATUS_WEBCAM_STARTED);

    for i in 0..3 {
        let cmd = expect_frame(&rx);
        assert_eq!(cmd.frame, i);
        assert_eq!(cmd.hands, 0);
        assert_eq!(cmd.camera.resolution(), Resolution::new(64, 48));
        assert_eq!(cmd.camera.get(0, 0), Color::BLUE);
        assert_eq!(cmd.camera.get(63, 0), Color::RED);

        // Nothing has been zoomed yet, so the zoomed view shows the camera frame.
        assert!(Arc::ptr_eq(&cmd.zoomed, &cmd.camera));
        assert_eq!(cmd.scale, 1.0);
    }

    wait_until_idle(&pipeline);
    pipeline.stop();
    assert!(rx.try_recv().is_err());
}

#[test]
fn pinch_recomposes_zoomed_view() {
    let frames = vec![split_frame(); 2];
    let detector = ScriptedHands::new(vec![two_hands(0.1), two_hands(0.2)]);
    let (mut pipeline, rx) = pipeline(PipelineConfig::default(), scripted(frames), detector);

    let source = Arc::new(Image::filled(40, 30, Color::GREEN));
    pipeline.select_image(source).unwrap();
    expect_status(&rx, STATUS_WEBCAM_STARTED);

    // The first span arms the gesture at a zoom factor of 1.
    let first = expect_frame(&rx);
    assert_eq!(first.hands, 2);
    assert_eq!(first.scale, 1.0);
    assert!(Arc::ptr_eq(&first.zoomed, &first.camera));

    // Doubling the span moves the smoothed factor by one smoothing step.
    let second = expect_frame(&rx);
    assert_relative_eq!(second.scale, 1.1, epsilon = 1e-5);
    assert!(!Arc::ptr_eq(&second.zoomed, &second.camera));
    assert_eq!(second.zoomed.resolution(), Resolution::new(40, 30));
    assert_eq!(second.zoomed.get(20, 15), Color::GREEN);

    wait_until_idle(&pipeline);
}

#[test]
fn failed_open_stays_idle() {
    let open = || -> anyhow::Result<Box<dyn FrameSource>> { anyhow::bail!("no such device") };
    let (mut pipeline, rx) = pipeline(PipelineConfig::default(), open, NoHands);

    let err = pipeline
        .select_image(Arc::new(Image::filled(4, 4, Color::GREEN)))
        .unwrap_err();
    assert!(matches!(err, Error::DeviceUnavailable(_)), "{err:?}");
    assert_eq!(pipeline.state(), PipelineState::Idle);
    expect_status(&rx, "Could not open webcam.");

    // Selecting another image retries.
    assert!(pipeline
        .select_image(Arc::new(Image::filled(4, 4, Color::RED)))
        .is_err());
    expect_status(&rx, "Could not open webcam.");
}

#[test]
fn stop_from_other_thread() {
    let (mut pipeline, rx) = pipeline(
        PipelineConfig::default().thread_name("capture-test"),
        endless(split_frame()),
        NoHands,
    );

    pipeline
        .select_image(Arc::new(Image::filled(4, 4, Color::GREEN)))
        .unwrap();
    expect_status(&rx, STATUS_WEBCAM_STARTED);
    expect_frame(&rx);
    assert_eq!(pipeline.state(), PipelineState::Active);

    let handle = pipeline.stop_handle();
    thread::spawn(move || handle.stop()).join().unwrap();
    wait_until_idle(&pipeline);

    // The loop can be started again afterwards.
    pipeline
        .select_image(Arc::new(Image::filled(4, 4, Color::GREEN)))
        .unwrap();
    assert_eq!(pipeline.state(), PipelineState::Active);
    pipeline.stop();
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn switches_image_while_running() {
    // Alternating spans keep the zoom factor moving, so the view is recomposed often.
    let detector = ScriptedHands::new(vec![two_hands(0.1), two_hands(0.3)]);
    let (mut pipeline, rx) = pipeline(PipelineConfig::default(), endless(split_frame()), detector);

    pipeline
        .select_image(Arc::new(Image::filled(20, 20, Color::GREEN)))
        .unwrap();
    expect_status(&rx, STATUS_WEBCAM_STARTED);

    let start = Instant::now();
    while expect_frame(&rx).zoomed.resolution() != Resolution::new(20, 20) {
        assert!(start.elapsed() < TIMEOUT, "first image never shown");
    }

    let second = Arc::new(Image::filled(30, 10, Color::BLUE));
    pipeline.select_image(second.clone()).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Active);
    assert!(Arc::ptr_eq(pipeline.image().unwrap(), &second));

    // Frames processed before the switch still show the first image. The first one processed
    // after it has dropped the zoomed view and restarted the gesture at a factor of 1.
    let start = Instant::now();
    let switched = loop {
        let cmd = expect_frame(&rx);
        if Arc::ptr_eq(&cmd.zoomed, &cmd.camera) {
            break cmd;
        }
        assert_eq!(cmd.zoomed.resolution(), Resolution::new(20, 20));
        assert!(start.elapsed() < TIMEOUT, "switch never happened");
    };
    assert_eq!(switched.hands, 2);
    assert_eq!(switched.scale, 1.0);

    let start = Instant::now();
    loop {
        let cmd = expect_frame(&rx);
        if cmd.zoomed.resolution() == Resolution::new(30, 10) {
            assert_eq!(cmd.zoomed.get(15, 5), Color::BLUE);
            break;
        }
        assert!(start.elapsed() < TIMEOUT, "second image never shown");
    }

    pipeline.stop();
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn failing_frames_are_dropped() {
    let frames = vec![split_frame(); 5];
    let (mut pipeline, rx) = pipeline(
        PipelineConfig::default(),
        scripted(frames),
        Faulty { calls: 0 },
    );

    pipeline
        .select_image(Arc::new(Image::filled(4, 4, Color::GREEN)))
        .unwrap();
    expect_status(&rx, STATUS_WEBCAM_STARTED);

    // Frame 1 fails and frame 2 panics; the loop carries on with the rest.
    for i in [0, 3, 4] {
        assert_eq!(expect_frame(&rx).frame, i);
    }

    wait_until_idle(&pipeline);
    pipeline.stop();
    assert!(rx.try_recv().is_err());
}

#[test]
fn slow_display_holds_one_pending_frame() {
    // Nobody ever takes frames out of the slot.
    let display = Arc::new(DisplaySlot::new(""));
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut pipeline = CapturePipeline::new(
        PipelineConfig::default(),
        endless(split_frame()),
        NoHands,
        display.clone(),
        tx,
    );

    pipeline
        .select_image(Arc::new(Image::filled(4, 4, Color::GREEN)))
        .unwrap();
    thread::sleep(Duration::from_millis(300));
    pipeline.stop();

    let notices = rx.try_iter().collect::<Vec<_>>();
    let wakeups = notices
        .iter()
        .filter(|notice| matches!(notice, Notice::FrameReady))
        .count();
    assert_eq!(wakeups, 1, "{notices:?}");
    assert!(matches!(&notices[0], Notice::Status(s) if s == STATUS_WEBCAM_STARTED));

    // The slot kept replacing the frame in the meantime.
    let latest = display.snapshot().frame.unwrap();
    assert!(latest.frame >= 10, "only {} frames captured", latest.frame + 1);
}

#[test]
fn selection_survives_end_of_stream() {
    let (feed, frames) = crossbeam_channel::unbounded();
    let (reads_tx, reads) = crossbeam_channel::unbounded();
    let opened = Arc::new(AtomicUsize::new(0));
    let open = {
        let opened = opened.clone();
        move || -> anyhow::Result<Box<dyn FrameSource>> {
            if opened.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Box::new(Fed {
                    frames: frames.clone(),
                    reads: reads_tx.clone(),
                }))
            } else {
                Ok(Box::new(Scripted(vec![split_frame(); 2].into())))
            }
        }
    };
    let detector = ScriptedHands::new(vec![two_hands(0.1), two_hands(0.2)]);
    let (mut pipeline, rx) = pipeline(PipelineConfig::default(), open, detector);

    pipeline
        .select_image(Arc::new(Image::filled(20, 20, Color::GREEN)))
        .unwrap();
    expect_status(&rx, STATUS_WEBCAM_STARTED);
    feed.send(split_frame()).unwrap();
    assert_eq!(expect_frame(&rx).frame, 0);

    // Wait until the loop is blocked on the next frame, then switch images and end the stream.
    for _ in 0..2 {
        reads.recv_timeout(TIMEOUT).unwrap();
    }
    let second = Arc::new(Image::filled(30, 10, Color::BLUE));
    pipeline.select_image(second).unwrap();
    drop(feed);

    // The source is reopened for the new image and the gesture starts over.
    expect_status(&rx, STATUS_WEBCAM_STARTED);
    let first = expect_frame(&rx);
    assert_eq!(first.frame, 1);
    assert_eq!(first.scale, 1.0);
    assert!(Arc::ptr_eq(&first.zoomed, &first.camera));

    let second = expect_frame(&rx);
    assert_relative_eq!(second.scale, 0.95, epsilon = 1e-5);
    assert_eq!(second.zoomed.resolution(), Resolution::new(30, 10));
    assert_eq!(second.zoomed.get(15, 5), Color::BLUE);

    wait_until_idle(&pipeline);
    assert_eq!(opened.load(Ordering::SeqCst), 2);
}
