//! Frame capture.

pub mod webcam;

use crate::{image::Image, timer::Timer};

/// A blocking source of video frames.
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    ///
    /// An error means no frame could be acquired.
    fn read(&mut self) -> anyhow::Result<Image>;

    /// Timers of the source's internal stages, logged along with the frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read(&mut self) -> anyhow::Result<Image> {
        (**self).read()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}
