//! Tick timing for the host loop.
//!
//! ```ignore
//! let mut clock = TickClock::new(0.1);
//! loop {
//!     let dt = clock.tick();
//!     sim.step(dt)?;
//! }
//! ```

use std::time::{Duration, Instant};

/// Measures wall-clock time between ticks and turns it into a step size.
///
/// The step is clamped to `max_delta` so a stalled frame (window drag,
/// debugger break) does not produce one huge integration step.
#[derive(Debug)]
pub struct TickClock {
    last_tick: Instant,
    delta_secs: f32,
    max_delta: f32,
    tick_count: u64,
    fps: f32,
    fps_tick_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    fixed_delta: Option<f32>,
}

impl TickClock {
    pub fn new(max_delta: f32) -> Self {
        let now = Instant::now();
        Self {
            last_tick: now,
            delta_secs: 0.0,
            max_delta: max_delta.max(0.0),
            tick_count: 0,
            fps: 0.0,
            fps_tick_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
        }
    }

    /// Advance the clock and return the step size for this tick.
    ///
    /// Returns 0 while paused.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let raw = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        if self.paused {
            self.delta_secs = 0.0;
            return 0.0;
        }

        self.delta_secs = self.fixed_delta.unwrap_or(raw).min(self.max_delta);
        self.tick_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let ticks = self.tick_count - self.fps_tick_count;
            self.fps = ticks as f32 / fps_elapsed.as_secs_f32();
            self.fps_tick_count = self.tick_count;
            self.fps_update_time = now;
        }

        self.delta_secs
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.tick_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }

    pub fn set_max_delta(&mut self, max_delta: f32) {
        self.max_delta = max_delta.max(0.0);
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Use a constant step instead of wall-clock time. `None` restores
    /// measured timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_tick_counts() {
        let mut clock = TickClock::new(1.0);
        thread::sleep(Duration::from_millis(5));
        assert!(clock.tick() > 0.0);
        assert_eq!(clock.ticks(), 1);
    }

    #[test]
    fn test_delta_clamped() {
        let mut clock = TickClock::new(0.001);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.tick(), 0.001);
    }

    #[test]
    fn test_pause_yields_zero() {
        let mut clock = TickClock::new(1.0);
        clock.toggle_pause();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.ticks(), 0);
        clock.toggle_pause();
        assert!(!clock.is_paused());
    }

    #[test]
    fn test_fixed_delta() {
        let mut clock = TickClock::new(1.0);
        clock.set_fixed_delta(Some(1.0 / 60.0));
        thread::sleep(Duration::from_millis(30));
        assert!((clock.tick() - 1.0 / 60.0).abs() < 1e-6);
    }
}
