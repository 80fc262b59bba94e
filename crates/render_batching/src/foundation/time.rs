//! Time management utilities
//!
//! Stopwatch used to profile individual batching passes.

use std::time::{Duration, Instant};

/// Simple stopwatch for measuring elapsed time
#[derive(Debug)]
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start the stopwatch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the stopwatch and accumulate elapsed time
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time {
            self.elapsed += start.elapsed();
            self.start_time = None;
        }
    }

    /// Return the time accumulated so far and restart from zero
    pub fn lap(&mut self) -> Duration {
        let lap = self.elapsed();
        self.elapsed = Duration::ZERO;
        self.start_time = Some(Instant::now());
        lap
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        let current_elapsed = self.start_time.map_or(Duration::ZERO, |start| start.elapsed());
        self.elapsed + current_elapsed
    }

    /// Check if the stopwatch is currently running
    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }
}

/// Wall-clock time spent in each batching pass during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassTimings {
    /// Capacity check and array growth
    pub ensure_capacity: Duration,
    /// Departed renderables
    pub remove: Duration,
    /// Newly registered renderables
    pub add: Duration,
    /// Signature changes
    pub change: Duration,
    /// Group-sorted index write
    pub sort_write: Duration,
    /// World transform resolve and write
    pub transform_write: Duration,
}

impl PassTimings {
    /// Sum of every pass
    pub fn total(&self) -> Duration {
        self.ensure_capacity
            + self.remove
            + self.add
            + self.change
            + self.sort_write
            + self.transform_write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwatch_lap_resets() {
        let mut stopwatch = Stopwatch::start_new();
        std::thread::sleep(Duration::from_millis(2));
        let lap = stopwatch.lap();

        assert!(lap >= Duration::from_millis(2));
        assert!(stopwatch.is_running());
        assert!(stopwatch.elapsed() < lap + Duration::from_secs(1));
    }

    #[test]
    fn test_pass_timings_total() {
        let timings = PassTimings {
            remove: Duration::from_millis(1),
            transform_write: Duration::from_millis(3),
            ..Default::default()
        };
        assert_eq!(timings.total(), Duration::from_millis(4));
    }
}
