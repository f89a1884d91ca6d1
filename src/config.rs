//! Startup configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `FINGERCOUNT_MODEL_DIR` | `models` |
//! | `FINGERCOUNT_PALM_MODEL` | `<model dir>/palm_detection_full.onnx` |
//! | `FINGERCOUNT_LANDMARK_MODEL` | `<model dir>/hand_landmark_full.onnx` |
//! | `FINGERCOUNT_MAX_HANDS` | `2` |
//! | `FINGERCOUNT_DETECTION_CONFIDENCE` | `0.7` |
//! | `FINGERCOUNT_TRACKING_CONFIDENCE` | `0.5` |
//! | `FINGERCOUNT_LABELS` | `order` (or `handedness`) |
//! | `FINGERCOUNT_QUIT_KEY` | `q` |
//! | `FINGERCOUNT_WEBCAM_NAME` | any device |
//! | `FINGERCOUNT_RESOLUTION` | largest available (`<width>x<height>` sets a minimum) |
//! | `FINGERCOUNT_FPS` | any |
//! | `FINGERCOUNT_PREFER` | `resolution` (or `framerate`) |

use std::{env, path::PathBuf, str::FromStr};

use anyhow::{bail, Context};

use crate::{
    app::Labeling,
    hand::provider::HandLandmarkerOptions,
    image::Resolution,
    video::webcam::{ParamPreference, WebcamOptions},
};

const PREFIX: &str = "FINGERCOUNT_";
const DEFAULT_MODEL_DIR: &str = "models";
const PALM_MODEL_FILE: &str = "palm_detection_full.onnx";
const LANDMARK_MODEL_FILE: &str = "hand_landmark_full.onnx";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub palm_model: PathBuf,
    pub landmark_model: PathBuf,
    pub landmarker: HandLandmarkerOptions,
    pub labeling: Labeling,
    pub quit_key: char,
    pub webcam_name: Option<String>,
    /// Minimum webcam resolution.
    pub resolution: Option<Resolution>,
    /// Minimum webcam frame rate.
    pub fps: Option<u32>,
    pub prefer: ParamPreference,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a full variable name to its value.
    ///
    /// Unset variables take their default. A value that fails to parse is an error naming the
    /// variable.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let full = format!("{PREFIX}{name}");
            let value = lookup(&full);
            if let Some(value) = &value {
                log::debug!("`{}` is set to '{}'", full, value);
            }
            (full, value)
        };

        let (_, dir) = var("MODEL_DIR");
        let dir = PathBuf::from(dir.unwrap_or_else(|| DEFAULT_MODEL_DIR.to_string()));
        let palm_model = var("PALM_MODEL")
            .1
            .map_or_else(|| dir.join(PALM_MODEL_FILE), PathBuf::from);
        let landmark_model = var("LANDMARK_MODEL")
            .1
            .map_or_else(|| dir.join(LANDMARK_MODEL_FILE), PathBuf::from);

        let defaults = HandLandmarkerOptions::default();
        let landmarker = defaults
            .clone()
            .max_hands(parse(var("MAX_HANDS"))?.unwrap_or(defaults.get_max_hands()))
            .detection_confidence(
                parse(var("DETECTION_CONFIDENCE"))?
                    .unwrap_or(defaults.get_detection_confidence()),
            )
            .tracking_confidence(
                parse(var("TRACKING_CONFIDENCE"))?.unwrap_or(defaults.get_tracking_confidence()),
            );
        landmarker.validate()?;

        let labeling = parse_with(var("LABELS"), parse_labeling)?.unwrap_or_default();
        let quit_key = parse(var("QUIT_KEY"))?.unwrap_or('q');

        let webcam_name = var("WEBCAM_NAME").1;
        let resolution = parse_with(var("RESOLUTION"), parse_resolution)?;
        let fps = parse(var("FPS"))?;
        let prefer = parse_with(var("PREFER"), parse_preference)?.unwrap_or_default();

        Ok(Self {
            palm_model,
            landmark_model,
            landmarker,
            labeling,
            quit_key,
            webcam_name,
            resolution,
            fps,
            prefer,
        })
    }

    pub fn webcam_options(&self) -> WebcamOptions {
        let mut options = WebcamOptions::default().prefer(self.prefer);
        if let Some(name) = &self.webcam_name {
            options = options.name(name.clone());
        }
        if let Some(resolution) = self.resolution {
            options = options.resolution(resolution);
        }
        if let Some(fps) = self.fps {
            options = options.fps(fps);
        }
        options
    }
}

fn parse<T>((name, value): (String, Option<String>)) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .with_context(|| format!("invalid `{name}`: '{value}'"))
        })
        .transpose()
}

fn parse_with<T>(
    (name, value): (String, Option<String>),
    f: impl FnOnce(&str) -> anyhow::Result<T>,
) -> anyhow::Result<Option<T>> {
    value
        .map(|value| f(&value).with_context(|| format!("invalid `{name}`: '{value}'")))
        .transpose()
}

fn parse_labeling(value: &str) -> anyhow::Result<Labeling> {
    match value.trim().to_ascii_lowercase().as_str() {
        "order" => Ok(Labeling::Order),
        "handedness" => Ok(Labeling::Handedness),
        other => bail!("unknown labeling '{}', expected `order` or `handedness`", other),
    }
}

fn parse_preference(value: &str) -> anyhow::Result<ParamPreference> {
    match value.trim().to_ascii_lowercase().as_str() {
        "resolution" => Ok(ParamPreference::Resolution),
        "framerate" | "fps" => Ok(ParamPreference::Framerate),
        other => bail!("unknown preference '{}', expected `resolution` or `framerate`", other),
    }
}

/// Parses `<width>x<height>`, e.g. `1280x720`.
fn parse_resolution(value: &str) -> anyhow::Result<Resolution> {
    let (width, height) = value
        .trim()
        .split_once(|c| c == 'x' || c == 'X')
        .context("expected `<width>x<height>`")?;
    let width: u32 = width.trim().parse()?;
    let height: u32 = height.trim().parse()?;
    if width == 0 || height == 0 {
        bail!("resolution must not be empty");
    }
    Ok(Resolution::new(width, height))
}
