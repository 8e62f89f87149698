use std::time::{Duration, Instant};

/// Frame clock for the render loop.
///
/// `elapsed` is monotonically non-decreasing and is read once per frame by
/// the pipeline and the patched-material driver. Values are reported in
/// milliseconds, the unit all time-scale constants in the crate assume.
#[derive(Debug, Clone)]
pub struct Clock {
    start_time: Instant,
    /// Time since last tick
    pub delta: Duration,
    /// Total elapsed time since creation
    pub elapsed: Duration,
    /// Total number of ticks
    pub frame_count: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Creates a new clock starting from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Advances the clock to the current wall time.
    pub fn tick(&mut self) {
        self.advance_to(self.start_time.elapsed());
    }

    /// Advances the clock to a fixed elapsed time (fixed-step and headless runs).
    ///
    /// Requests that would move the clock backwards leave `elapsed` unchanged.
    pub fn advance_to(&mut self, elapsed: Duration) {
        let elapsed = elapsed.max(self.elapsed);
        self.delta = elapsed - self.elapsed;
        self.elapsed = elapsed;
        self.frame_count += 1;
    }

    /// Elapsed time in milliseconds.
    ///
    /// Kept in `f64`; an `f32` stops resolving whole milliseconds after
    /// about 4.6 hours.
    #[inline]
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    #[inline]
    #[must_use]
    pub fn delta_ms(&self) -> f64 {
        self.delta.as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_never_moves_backwards() {
        let mut clock = Clock::new();
        clock.advance_to(Duration::from_millis(500));
        clock.advance_to(Duration::from_millis(200));

        assert_eq!(clock.elapsed, Duration::from_millis(500));
        assert_eq!(clock.delta, Duration::ZERO);
        assert_eq!(clock.frame_count, 2);
    }

    #[test]
    fn elapsed_is_reported_in_milliseconds() {
        let mut clock = Clock::new();
        clock.advance_to(Duration::from_millis(1000));
        assert_eq!(clock.elapsed_ms(), 1000.0);
        assert_eq!(clock.delta_ms(), 1000.0);
    }

    #[test]
    fn long_sessions_keep_millisecond_resolution() {
        let mut clock = Clock::new();
        // Five hours: past the point where f32 can step by one millisecond.
        let base = Duration::from_secs(5 * 3600);
        clock.advance_to(base);
        let before = clock.elapsed_ms();
        clock.advance_to(base + Duration::from_millis(1));

        assert!((clock.elapsed_ms() - before - 1.0).abs() < 1e-6);
        assert_eq!(clock.delta_ms(), 1.0);
    }
}
