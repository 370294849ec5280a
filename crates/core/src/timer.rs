//! Frame timer driving the update step and the FPS readout.

use std::time::{Duration, Instant};

/// Measures frame-to-frame time for the update loop.
///
/// The first `tick` measures from construction (or the last `reset`).
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    last_delta: Duration,
    frame_count: u64,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            last_delta: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Total time since the timer was created or reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Total time in seconds since the timer was created or reset.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Mark the start of a new frame and return the time since the previous one.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        self.last_delta = now - self.last_tick;
        self.last_tick = now;
        self.frame_count += 1;
        self.last_delta
    }

    /// [`Timer::tick`] in seconds.
    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }

    /// Number of ticks since the timer was created or reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second derived from the last measured delta.
    ///
    /// Returns 0 before the first tick or when the delta was too small to measure.
    pub fn fps(&self) -> f32 {
        let secs = self.last_delta.as_secs_f32();
        if secs > 0.0 { 1.0 / secs } else { 0.0 }
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
        self.last_delta = Duration::ZERO;
        self.frame_count = 0;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
