use std::{env, sync::Arc};

use pinchzoom::{
    gui::{Gui, UiAction},
    hand::{HandDetector, HandTracker, NoHands},
    image::Image,
    pipeline::{CapturePipeline, PipelineConfig, PresentationSink},
    present::{Notice, STATUS_IMAGE_LOADED},
    Error,
};

const DEFAULT_PALM_MODEL: &str = "3rdparty/onnx/palm_detection_lite.onnx";
const DEFAULT_HAND_MODEL: &str = "3rdparty/onnx/hand_landmark_lite.onnx";

fn load_detector() -> Box<dyn HandDetector> {
    let palm = env::var("PINCHZOOM_PALM_MODEL").unwrap_or_else(|_| DEFAULT_PALM_MODEL.into());
    let hand = env::var("PINCHZOOM_HAND_MODEL").unwrap_or_else(|_| DEFAULT_HAND_MODEL.into());
    match HandTracker::load(&palm, &hand) {
        Ok(tracker) => {
            log::info!("loaded hand tracking models '{}' and '{}'", palm, hand);
            Box::new(tracker)
        }
        Err(e) => {
            log::warn!("hand tracking disabled: {:#}", e);
            Box::new(NoHands)
        }
    }
}

fn main() -> anyhow::Result<()> {
    pinchzoom::init_logger!();

    let gui = Gui::new("Pinch Zoom")?;
    let poster = Arc::new(gui.poster());
    let mut pipeline = CapturePipeline::with_webcam(
        PipelineConfig::default(),
        load_detector(),
        gui.display(),
        poster.clone(),
    );

    log::info!("press O to open an image, Esc or Q to quit");
    gui.run(move |action| match action {
        UiAction::SelectImage => {
            let Some(path) = rfd::FileDialog::new()
                .add_filter("Images", &["png", "jpg", "jpeg", "gif"])
                .pick_file()
            else {
                return;
            };
            let image = match Image::load(&path) {
                Ok(image) => image,
                Err(source) => {
                    let err = Error::Load { path, source };
                    log::error!("{}", err);
                    poster.post(Notice::Status(err.status_message().into()));
                    return;
                }
            };
            poster.post(Notice::Status(STATUS_IMAGE_LOADED.into()));
            if let Err(e) = pipeline.select_image(Arc::new(image)) {
                // The pipeline has already reported this in the status line.
                log::error!("{}", e);
            }
        }
        UiAction::Exit => pipeline.stop(),
    })
}
