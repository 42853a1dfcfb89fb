//! High-resolution timers for frame timing.

use std::time::{Duration, Instant};

/// High-resolution timer for measuring elapsed time.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Get the total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the elapsed time in seconds since the timer was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Get the time elapsed since the last call to `tick()`.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Average frame rate over a fixed reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRate {
    /// Frames per second over the window.
    pub fps: f32,
    /// Mean frame time in milliseconds.
    pub frame_ms: f32,
}

/// Accumulates frame deltas and reports an average once per window.
///
/// Deltas are fed in explicitly so the counter can be driven by a [`Timer`]
/// in the app and by fixed values in tests.
#[derive(Debug)]
pub struct FrameRateCounter {
    window: Duration,
    accumulated: Duration,
    frames: u32,
}

impl FrameRateCounter {
    /// Creates a counter that reports every `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            accumulated: Duration::ZERO,
            frames: 0,
        }
    }

    /// Records one frame. Returns the average once the window has elapsed,
    /// then starts a new window.
    pub fn record(&mut self, delta: Duration) -> Option<FrameRate> {
        self.accumulated += delta;
        self.frames += 1;

        if self.accumulated < self.window {
            return None;
        }

        let frame_ms = self.accumulated.as_secs_f32() * 1000.0 / self.frames as f32;
        self.accumulated = Duration::ZERO;
        self.frames = 0;

        let fps = if frame_ms > 0.0 { 1000.0 / frame_ms } else { 0.0 };
        Some(FrameRate { fps, frame_ms })
    }
}

impl Default for FrameRateCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
