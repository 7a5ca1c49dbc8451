//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::env;

use anyhow::{anyhow, bail};
use linuxvideo::{
    format::{FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device,
};

use crate::{
    image::{Image, Resolution},
    timer::Timer,
    Error, Result,
};

use super::FrameSource;

const ENV_VAR_WEBCAM_NAME: &str = "PINCHZOOM_WEBCAM_NAME";

/// Webcam selection and format negotiation options.
///
/// By default, the first supported device is opened at the frame size closest to 640x480.
#[derive(Debug, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    resolution: Resolution,
}

impl Default for WebcamOptions {
    fn default() -> Self {
        Self {
            name: None,
            resolution: Resolution::RES_480P,
        }
    }
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    /// The `PINCHZOOM_WEBCAM_NAME` environment variable takes precedence over this setting.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired frame size.
    ///
    /// The supported size closest to it will be used.
    #[inline]
    pub fn resolution(self, resolution: Resolution) -> Self {
        Self { resolution, ..self }
    }
}

/// Picks the frame size whose pixel count is closest to `wanted`, preferring larger sizes on ties.
fn closest_size(sizes: &[Resolution], wanted: Resolution) -> Option<Resolution> {
    sizes.iter().copied().min_by_key(|res| {
        let diff = res.num_pixels().abs_diff(wanted.num_pixels());
        (diff, std::cmp::Reverse(res.num_pixels()))
    })
}

fn negotiate_format(device: &Device, wanted: Resolution) -> anyhow::Result<PixFormat> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let resolution = match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            let sizes = sizes
                .iter()
                .map(|size| Resolution::new(size.width(), size.height()))
                .collect::<Vec<_>>();
            log::trace!("supported frame sizes: {:?}", sizes);
            closest_size(&sizes, wanted).ok_or_else(|| anyhow!("device reports no frame sizes"))?
        }
        // The driver adjusts the requested size to the nearest supported one.
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => wanted,
    };

    Ok(PixFormat::new(
        resolution.width(),
        resolution.height(),
        pixel_format,
    ))
}

/// Decodes a JPEG frame into an [`Image`].
fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let mut decoder = jpeg_decoder::Decoder::new(data);
    let pixels = decoder.decode()?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("JPEG decoder returned no image info"))?;
    let res = Resolution::new(info.width.into(), info.height.into());

    let image = match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => Image::from_rgb8(res, &pixels),
        jpeg_decoder::PixelFormat::L8 => {
            let rgb = pixels.iter().flat_map(|&l| [l, l, l]).collect::<Vec<_>>();
            Image::from_rgb8(res, &rgb)
        }
        other => bail!("unsupported JPEG pixel format {:?}", other),
    };
    image.ok_or_else(|| anyhow!("JPEG data does not match its {res} header"))
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    /// Dequeue and decode.
    timers: [Timer; 2],
}

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: &WebcamOptions) -> anyhow::Result<Self> {
        let name_override = env::var(ENV_VAR_WEBCAM_NAME).ok();
        if let Some(name) = &name_override {
            log::debug!(
                "webcam override: `{}` is set to '{}'",
                ENV_VAR_WEBCAM_NAME,
                name,
            );
        }
        let name = name_override.as_deref().or(options.name.as_deref());

        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_impl(dev, name, options.resolution) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => {
                        log::debug!("{}", e);
                    }
                },
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        match name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_impl(
        dev: Device,
        name: Option<&str>,
        wanted: Resolution,
    ) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = name {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let pixfmt = negotiate_format(&dev, wanted)?;
        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());

        log::info!("opened {} ({}), {}", caps.card(), path.display(), resolution);

        let stream = capture.into_stream(2)?;

        Ok(Some(Self {
            stream,
            resolution,
            timers: [Timer::new("dequeue"), Timer::new("decode")],
        }))
    }

    /// Returns the size of the frames produced by this webcam.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl FrameSource for Webcam {
    /// Reads the next frame from the camera.
    ///
    /// A frame that fails to decode is replaced with a blank image; only a failure of the device
    /// itself ends the stream.
    fn read(&mut self) -> Result<Image> {
        let [t_dequeue, t_decode] = &self.timers;
        let res = self.resolution();
        let dequeue_guard = t_dequeue.start();
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let image = match t_decode.time(|| decode_jpeg(&buf)) {
                    Ok(image) => image,
                    Err(e) => {
                        // Webcams produce the occasional corrupted MJPG frame. Skipping it would
                        // double the latency of the next one.
                        log::error!("webcam decode error: {}", e);
                        Image::new(res.width(), res.height())
                    }
                };
                Ok(image)
            })
            .map_err(|e| {
                log::warn!("webcam stream failed: {}", e);
                Error::EndOfStream
            })
    }

    fn timers(&self) -> &[Timer] {
        &self.timers
    }
}
