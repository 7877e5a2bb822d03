//! Wall-clock frame timing for the variable-step main loop.

use std::time::{Duration, Instant};

/// Frame clock. The simulation integrates with the raw frame delta.
///
/// The first [`Time::update`] only starts the clock and reports a zero
/// delta, so startup work never shows up as one huge simulation step.
#[derive(Debug, Default)]
pub struct Time {
    /// First `update` call.
    started: Option<Instant>,
    /// Most recent `update` call.
    previous: Option<Instant>,
    delta: Duration,
    frames: u64,
}

impl Time {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call once at the start of every frame.
    pub fn update(&mut self) {
        self.tick(Instant::now());
    }

    fn tick(&mut self, now: Instant) {
        self.delta = self
            .previous
            .map_or(Duration::ZERO, |previous| now.saturating_duration_since(previous));
        self.started.get_or_insert(now);
        self.previous = Some(now);
        self.frames += 1;
    }

    /// Seconds between the last two updates; zero after the first.
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Seconds from the first update to the latest one.
    pub fn elapsed_seconds(&self) -> f32 {
        match (self.started, self.previous) {
            (Some(started), Some(previous)) => previous.saturating_duration_since(started).as_secs_f32(),
            _ => 0.0,
        }
    }

    /// Number of `update` calls so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Instantaneous frame rate from the last delta, 0 when unknown.
    pub fn fps(&self) -> f32 {
        let dt = self.delta_seconds();
        if dt > 0.0 {
            dt.recip()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_reports_zero_delta() {
        let mut t = Time::new();
        assert_eq!(t.frame_count(), 0);
        t.tick(Instant::now() + Duration::from_secs(3));
        assert_eq!(t.delta_seconds(), 0.0);
        assert_eq!(t.frame_count(), 1);
        assert_eq!(t.fps(), 0.0);
        assert_eq!(t.elapsed_seconds(), 0.0);
    }

    #[test]
    fn later_updates_measure_the_gap() {
        let mut t = Time::new();
        let start = Instant::now();
        t.tick(start);
        t.tick(start + Duration::from_millis(16));
        t.tick(start + Duration::from_millis(48));
        assert_eq!(t.frame_count(), 3);
        assert!((t.delta_seconds() - 0.032).abs() < 1e-6);
        assert!((t.elapsed_seconds() - 0.048).abs() < 1e-6);
        assert!((t.fps() - 31.25).abs() < 1e-3);
    }

    #[test]
    fn clock_going_backwards_saturates_to_zero() {
        let mut t = Time::new();
        let start = Instant::now();
        t.tick(start + Duration::from_millis(10));
        t.tick(start);
        assert_eq!(t.delta_seconds(), 0.0);
    }
}
