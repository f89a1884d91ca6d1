//! Performance measurement tools.

use std::{
    cell::Cell,
    fmt,
    time::{Duration, Instant},
};

use itertools::Itertools;

/// A named accumulator for the time an operation takes.
///
/// Displaying the timer with `{}` prints the average of the recorded timings and resets it.
pub struct Timer {
    name: &'static str,
    total: Cell<Duration>,
    count: Cell<u32>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total: Cell::new(Duration::ZERO),
            count: Cell::new(0),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation.
    ///
    /// The time until the returned [`TimerGuard`] is dropped is recorded.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    /// Number of timings recorded since the last reset.
    pub fn count(&self) -> u32 {
        self.count.get()
    }

    fn record(&self, duration: Duration) {
        self.total.set(self.total.get() + duration);
        self.count.set(self.count.get() + 1);
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count.replace(0);
        let total = self.total.replace(Duration::ZERO);
        let avg_ms = if count == 0 {
            0.0
        } else {
            total.as_secs_f32() * 1000.0 / count as f32
        };

        write!(f, "{}: {count}x{avg_ms:.01}ms", self.name)
    }
}

/// Guard returned by [`Timer::start`]. Records the elapsed time when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Logs frames per second, once per second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Counts a frame, and logs the FPS along with `extra` (typically [`Timer`]s) if a second has
    /// passed.
    ///
    /// `extra` is only formatted when something is logged, so timers are reset once per second.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.start.elapsed() < Duration::from_secs(1) {
            return;
        }

        let extra = extra.into_iter().join(", ");
        if extra.is_empty() {
            log::debug!("{}: {} FPS", self.name, self.frames);
        } else {
            log::debug!("{}: {} FPS ({})", self.name, self.frames, extra);
        }

        self.frames = 0;
        self.start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_averages_and_resets() {
        let timer = Timer::new("work");
        timer.time(|| {});
        {
            let _guard = timer.start();
        }
        assert_eq!(timer.count(), 2);

        let shown = timer.to_string();
        assert!(shown.starts_with("work: 2x"), "{shown}");
        assert!(shown.ends_with("ms"), "{shown}");
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.to_string(), "work: 0x0.0ms");
    }

    #[test]
    fn timer_returns_closure_value() {
        let timer = Timer::new("t");
        assert_eq!(timer.time(|| 7), 7);
    }
}
