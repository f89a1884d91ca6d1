//! Window output and keyboard input.
//!
//! Everything here runs on the calling thread. [`Window::poll`] pumps the native event loop for a
//! bounded amount of time instead of handing control to it, so the frame loop stays in charge.

mod renderer;

use std::time::{Duration, Instant};

use winit::{
    event::{Event, WindowEvent},
    event_loop::EventLoop,
    platform::run_return::EventLoopExtRunReturn,
};

use crate::image::Image;

use self::renderer::{open_window, Gpu, Renderer};

/// User input collected while polling a [`Surface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A character was typed while the window had focus.
    Key(char),
    /// The user asked to close the window.
    CloseRequested,
}

/// Something that can display frames and report user input.
pub trait Surface {
    /// Displays `image`, replacing the previous frame.
    fn show(&mut self, image: &Image) -> anyhow::Result<()>;

    /// Waits at most `timeout` for input and returns everything received.
    fn poll(&mut self, timeout: Duration) -> anyhow::Result<Vec<Input>>;
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        (**self).show(image)
    }

    fn poll(&mut self, timeout: Duration) -> anyhow::Result<Vec<Input>> {
        (**self).poll(timeout)
    }
}

/// A native window showing one image.
///
/// The window itself is only opened when the first frame is shown, at that frame's resolution.
pub struct Window {
    title: String,
    renderer: Option<Renderer>,
    // Declared after `renderer` so the window is closed before the event loop goes away.
    event_loop: EventLoop<()>,
}

impl Window {
    /// Connects to the display server.
    ///
    /// Must be called on the main thread.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            renderer: None,
            event_loop: EventLoop::new(),
        }
    }

    fn renderer(&mut self, image: &Image) -> anyhow::Result<&mut Renderer> {
        let renderer = match self.renderer.take() {
            Some(renderer) => renderer,
            None => {
                let res = image.resolution();
                log::debug!("creating window '{}' at {}", self.title, res);
                let window = open_window(&self.event_loop, &self.title, res)?;
                let gpu = pollster::block_on(Gpu::open())?;
                Renderer::new(window, gpu)?
            }
        };
        Ok(self.renderer.insert(renderer))
    }
}

impl Surface for Window {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        let renderer = self.renderer(image)?;
        renderer.update_texture(image.resolution(), image.data())?;
        renderer.redraw()
    }

    fn poll(&mut self, timeout: Duration) -> anyhow::Result<Vec<Input>> {
        let deadline = Instant::now() + timeout;
        let mut inputs = Vec::new();
        let mut error = None;
        let renderer = &mut self.renderer;

        self.event_loop.run_return(|event, _, flow| match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::ReceivedCharacter(c) => inputs.push(Input::Key(c)),
                WindowEvent::CloseRequested => inputs.push(Input::CloseRequested),
                _ => {}
            },
            Event::RedrawRequested(_) => {
                if let Some(renderer) = renderer {
                    if let Err(e) = renderer.redraw() {
                        error = Some(e);
                        flow.set_exit();
                    }
                }
            }
            Event::MainEventsCleared => {
                if Instant::now() >= deadline {
                    flow.set_exit();
                } else {
                    flow.set_wait_until(deadline);
                }
            }
            _ => {}
        });

        match error {
            Some(e) => Err(e),
            None => Ok(inputs),
        }
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        if self.renderer.is_some() {
            log::debug!("closing window '{}'", self.title);
        }
    }
}
