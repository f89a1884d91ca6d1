//! V4L2 webcam access.
//!
//! Only `VIDEO_CAPTURE` devices producing JFIF JPEG or Motion JPEG frames are supported.

use anyhow::{bail, Context};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{
    image::{Image, Resolution},
    num::TotalF32,
    timer::Timer,
};

use super::FrameSource;

/// Whether format negotiation should keep the resolution or the frame rate when the camera can't
/// deliver both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    #[default]
    Resolution,
    Framerate,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Device selection and format negotiation options.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Only opens the device whose card name is `name`.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the minimum desired resolution.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the minimum desired frame rate.
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Sets which of resolution and frame rate to keep when the camera can't satisfy both.
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }
}

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        1.0 / self.frame_interval.as_f32()
    }
}

fn negotiate_format(device: &Device, prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if matches!(format.pixelformat(), Pixelformat::JPEG | Pixelformat::MJPG) {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }
    let pixel_format = pixel_format.context("device does not support JPEG or MJPG")?;

    let sizes = match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => sizes,
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported")
        }
    };

    let mut formats = Vec::new();
    for size in sizes {
        let intervals = match device.frame_intervals(pixel_format, size.width(), size.height())? {
            FrameIntervals::Discrete(intervals) => intervals,
            FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                bail!("stepwise or continuous frame rates are not supported")
            }
        };
        formats.extend(intervals.into_iter().map(|interval| FrameFormat {
            resolution: Resolution::new(size.width(), size.height()),
            frame_interval: *interval.fract(),
        }));
    }

    let fmt = select_format(&formats, prefs).context("failed to negotiate a webcam format")?;
    let pixfmt = PixFormat::new(
        fmt.resolution.width(),
        fmt.resolution.height(),
        pixel_format,
    );
    Ok((pixfmt, fmt.frame_interval))
}

/// Picks the best format for `prefs`, dropping constraints in order of preference until one fits.
fn select_format(formats: &[FrameFormat], mut prefs: FramePrefs) -> Option<FrameFormat> {
    loop {
        if let Some(fmt) = select_format_step(formats, prefs) {
            return Some(fmt);
        }

        log::debug!("no webcam format matches {:?}", prefs);
        let dropped = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
        };
        if !dropped {
            return None;
        }
    }
}

fn select_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut eligible = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs
                .fps
                .map_or(true, |fps| fmt.fps().round() >= fps as f32)
        })
        .copied()
        .collect::<Vec<_>>();

    // Best format last.
    match prefs.pref {
        ParamPreference::Resolution => {
            eligible.sort_by_key(|fmt| (fmt.resolution.num_pixels(), TotalF32(fmt.fps())))
        }
        ParamPreference::Framerate => {
            eligible.sort_by_key(|fmt| (TotalF32(fmt.fps()), fmt.resolution.num_pixels()))
        }
    }
    eligible.pop()
}

/// A V4L2 webcam.
///
/// The device is released when the `Webcam` is dropped.
pub struct Webcam {
    stream: ReadStream,
    card: String,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam.
    ///
    /// This can block for hundreds of milliseconds while the camera initializes.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        let WebcamOptions { name, frame } = options;

        for res in linuxvideo::list()? {
            let dev = match res {
                Ok(dev) => dev,
                Err(e) => {
                    log::warn!("{}", e);
                    continue;
                }
            };
            match Self::open_device(dev, name.as_deref(), frame) {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) => log::debug!("skipping device: {:#}", e),
            }
        }

        match name {
            Some(name) => bail!("no supported webcam named '{}' found", name),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_device(
        dev: Device,
        name: Option<&str>,
        prefs: FramePrefs,
    ) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if name.map_or(false, |name| caps.card() != name) {
            return Ok(None);
        }

        let flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            flags,
        );
        if !flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, interval) = negotiate_format(&dev, prefs)?;
        let capture = dev.video_capture(pixfmt)?;
        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let actual = capture.set_frame_interval(interval)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / actual.as_f32(),
        );

        Ok(Some(Self {
            stream: capture.into_stream(2)?,
            card: caps.card().to_string(),
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

}

impl FrameSource for Webcam {
    /// Dequeues and decodes the next frame.
    ///
    /// A frame that fails to decode is replaced by a blank image of the same size and logged.
    /// Only device errors are returned.
    fn read(&mut self) -> anyhow::Result<Image> {
        let resolution = self.resolution;
        let t_decode = &self.t_decode;
        let dequeue_guard = self.t_dequeue.start();
        let image = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            // Corrupted MJPG frames happen occasionally over USB.
            let image = t_decode
                .time(|| Image::decode_jpeg(&buf))
                .unwrap_or_else(|e| {
                    log::error!("webcam decode error: {:#}", e);
                    Image::new(resolution.width(), resolution.height())
                });
            Ok(image)
        })?;
        Ok(image)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        log::debug!("releasing webcam {}", self.card);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(width, height),
            frame_interval: Fract::new(1, fps),
        }
    }

    fn summary(fmt: Option<FrameFormat>) -> Option<(Resolution, u32)> {
        fmt.map(|fmt| (fmt.resolution, fmt.fps().round() as u32))
    }

    fn formats() -> Vec<FrameFormat> {
        vec![
            fmt(640, 480, 30),
            fmt(640, 480, 60),
            fmt(1280, 720, 30),
            fmt(1920, 1080, 15),
        ]
    }

    #[test]
    fn prefers_resolution_by_default() {
        let prefs = FramePrefs::default();
        assert_eq!(
            summary(select_format(&formats(), prefs)),
            Some((Resolution::new(1920, 1080), 15))
        );
    }

    #[test]
    fn prefers_framerate() {
        let prefs = FramePrefs {
            pref: ParamPreference::Framerate,
            ..Default::default()
        };
        assert_eq!(
            summary(select_format(&formats(), prefs)),
            Some((Resolution::new(640, 480), 60))
        );
    }

    #[test]
    fn honors_minimums() {
        let prefs = FramePrefs {
            resolution: Some(Resolution::new(1280, 720)),
            fps: Some(30),
            ..Default::default()
        };
        assert_eq!(
            summary(select_format(&formats(), prefs)),
            Some((Resolution::new(1280, 720), 30))
        );
    }

    #[test]
    fn relaxes_unreachable_prefs() {
        // No format does 4K, and none does 1080p at 60 FPS.
        let prefs = FramePrefs {
            resolution: Some(Resolution::new(1920, 1080)),
            fps: Some(60),
            pref: ParamPreference::Resolution,
        };
        assert_eq!(
            summary(select_format(&formats(), prefs)),
            Some((Resolution::new(1920, 1080), 15))
        );

        let prefs = FramePrefs {
            pref: ParamPreference::Framerate,
            ..prefs
        };
        assert_eq!(
            summary(select_format(&formats(), prefs)),
            Some((Resolution::new(640, 480), 60))
        );

        assert!(select_format(&[], prefs).is_none());
    }
}
