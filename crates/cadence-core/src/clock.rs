//! Frame timing.

use std::time::Instant;

/// Accumulates elapsed time across frames.
///
/// The frame-orchestration core never reads the wall clock itself: it is handed
/// the accumulated time, so every time-derived transform is a pure function of
/// the value this clock reports.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_tick: Instant,
    elapsed: f32,
    frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a clock starting at zero elapsed time.
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
            elapsed: 0.0,
            frame_count: 0,
        }
    }

    /// Sample the wall clock and advance by the time since the previous tick.
    ///
    /// Returns the delta time in seconds.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.advance(dt)
    }

    /// Advance by an explicit delta time in seconds.
    ///
    /// Negative or non-finite deltas are treated as zero.
    pub fn advance(&mut self, dt: f32) -> f32 {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.elapsed += dt;
        self.frame_count += 1;
        dt
    }

    /// Total elapsed time in seconds.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Number of ticks so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
