//! Clock and timing utilities for the motion and frame producers.
//!
//! Orientation samples and captured frames are both stamped against a
//! monotonic session epoch recorded when stabilization starts. This module
//! provides utilities for:
//! - Capturing the epoch
//! - Gating producers to a target rate
//! - Measuring how stale an orientation sample is relative to a frame

use std::time::{Duration, Instant};

/// A session clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment stabilization started).
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant the session started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new session clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get seconds elapsed since session start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at session start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Age of the orientation signal at the moment a frame was captured.
#[derive(Debug, Clone, Copy)]
pub struct SignalAge {
    /// Timestamp of the orientation sample (ns).
    pub sample_ns: u64,
    /// Timestamp of the frame it is applied to (ns).
    pub frame_ns: u64,
}

impl SignalAge {
    /// Age in nanoseconds (positive = sample predates the frame).
    pub fn age_ns(&self) -> i64 {
        self.frame_ns as i64 - self.sample_ns as i64
    }

    /// Age in milliseconds.
    pub fn age_ms(&self) -> f64 {
        self.age_ns() as f64 / 1_000_000.0
    }

    /// Whether the sample is further from the frame than the threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.age_ms().abs() > threshold_ms
    }
}

/// Tick period for a fixed-rate loop.
///
/// Returns `None` when the rate is zero or too high for a whole nanosecond
/// period; `tokio::time::interval` rejects a zero period.
pub fn tick_period(rate_hz: u32) -> Option<Duration> {
    if rate_hz == 0 {
        return None;
    }
    let period = Duration::from_nanos(1_000_000_000 / rate_hz as u64);
    (!period.is_zero()).then_some(period)
}

/// Tick gate for fixed-rate producers.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Forget the last tick so the next call fires immediately.
    pub fn reset(&mut self) {
        self.last_tick_ns = None;
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_anchored_at_start() {
        let clock = SessionClock::start();
        assert!(clock.elapsed_secs() < 1.0);
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_signal_age_against_threshold() {
        let age = SignalAge {
            sample_ns: 1_000_000_000,
            frame_ns: 1_020_000_000,
        };
        assert_eq!(age.age_ns(), 20_000_000);
        assert!((age.age_ms() - 20.0).abs() < 1e-9);
        assert!(age.exceeds_threshold_ms(10.0));
        assert!(!age.exceeds_threshold_ms(50.0));
    }

    #[test]
    fn test_tick_period_bounds() {
        assert_eq!(tick_period(120), Some(Duration::from_nanos(8_333_333)));
        assert_eq!(tick_period(1_000_000_000), Some(Duration::from_nanos(1)));
        assert_eq!(tick_period(2_000_000_000), None);
        assert_eq!(tick_period(0), None);
    }

    #[test]
    fn test_rate_controller_120hz() {
        let mut ctrl = RateController::new(120);
        assert_eq!(ctrl.interval_ns(), 8_333_333);
        assert!(ctrl.should_tick(0));
        assert!(!ctrl.should_tick(4_000_000));
        assert!(ctrl.should_tick(8_400_000));

        ctrl.reset();
        assert!(ctrl.should_tick(8_500_000));
    }
}
