//! Counts raised fingers in a mirrored webcam feed.
//!
//! The pipeline is a single-threaded loop ([`app::FrameLoop`]): read a frame, mirror it, find
//! hands with a [`LandmarkProvider`], count the extended fingers of each hand with a
//! [`FingerClassifier`], draw the result and show it in a window.
//!
//! Classification is a pure function of one hand's 21 keypoints and keeps no state between frames.
//! Everything with a lifetime (camera, provider, window) is owned by the loop and released when it
//! finishes.
//!
//! # Environment Variables
//!
//! Startup configuration is read from the environment by [`config::Config::from_env`]. See that
//! module for the full list, which includes `FINGERCOUNT_WEBCAM_NAME` to force a specific V4L2
//! device. Additionally, `RUST_LOG` overrides the default log filter set up by [`init_logger!`].
//!
//! [`LandmarkProvider`]: hand::provider::LandmarkProvider
//! [`FingerClassifier`]: hand::fingers::FingerClassifier

use log::LevelFilter;

pub mod app;
pub mod config;
pub mod detection;
pub mod gui;
pub mod hand;
pub mod image;
pub mod nn;
pub mod num;
pub mod overlay;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and `fingercount` log at *debug* level, `wgpu` logs at *warn* level. The
/// `RUST_LOG` environment variable can override both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
