//! Motion estimator: roll and translation compensation from raw samples.
//!
//! Each tick the estimator turns one gravity / user-acceleration pair into a
//! [`MotionSignal`]. Roll comes straight from gravity. Translation runs a
//! two-stage leaky integrator so sensor bias cannot drift the crop away and
//! the offset recentres while the device is still.

use levelcam_common::config::{MotionSettings, StabilizationMode};
use levelcam_crop_model::signal::{
    MotionSample, MotionSignal, OrientationSample, TranslationState, Vec3,
};

use crate::roll::roll_from_gravity;

/// Converts motion samples into the published signal.
#[derive(Debug, Clone)]
pub struct MotionEstimator {
    settings: MotionSettings,
    mode: StabilizationMode,
    active: bool,
    signal: MotionSignal,
    samples_seen: u64,
    samples_dropped: u64,
}

impl MotionEstimator {
    /// Create an idle estimator. Call [`start`](Self::start) before feeding samples.
    pub fn new(settings: MotionSettings, mode: StabilizationMode) -> Self {
        Self {
            settings,
            mode,
            active: false,
            signal: MotionSignal::NEUTRAL,
            samples_seen: 0,
            samples_dropped: 0,
        }
    }

    /// Begin accepting samples from a clean baseline.
    ///
    /// When the sensor is unavailable the estimator stays idle and keeps
    /// reporting the neutral signal; this is logged, not an error.
    pub fn start(&mut self, sensor_available: bool) -> bool {
        self.reset();
        if !sensor_available {
            tracing::debug!("Motion sensor unavailable, holding neutral signal");
            self.active = false;
            return false;
        }
        self.active = true;
        true
    }

    /// Stop accepting samples and reset every accumulator to zero.
    pub fn stop(&mut self) {
        self.active = false;
        self.reset();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one sample and return the updated signal.
    ///
    /// Inactive estimators and non-finite samples leave the signal unchanged.
    pub fn on_sample(&mut self, sample: &MotionSample) -> MotionSignal {
        if !self.active {
            return self.signal;
        }
        if !sample.gravity.is_finite() || !sample.user_acceleration.is_finite() {
            self.samples_dropped += 1;
            tracing::trace!(t = sample.timestamp_ns, "Dropping non-finite motion sample");
            return self.signal;
        }

        self.signal.orientation = OrientationSample {
            roll: roll_from_gravity(sample.gravity.x, sample.gravity.y),
            captured_at_ns: sample.timestamp_ns,
        };

        if self.mode.uses_translation() {
            self.integrate(sample.user_acceleration);
        }

        self.samples_seen += 1;
        self.signal
    }

    /// One step of the leaky integrator.
    fn integrate(&mut self, acceleration: Vec3) {
        let dt = self.settings.dt_secs();
        let MotionSettings {
            velocity_decay,
            offset_decay,
            sensitivity,
            ..
        } = self.settings;
        let t = &mut self.signal.translation;

        // The crop moves against the device, so acceleration enters negated.
        t.velocity_x = (t.velocity_x - acceleration.x * dt) * velocity_decay;
        t.velocity_y = (t.velocity_y - acceleration.y * dt) * velocity_decay;

        t.offset_x = ((t.offset_x + t.velocity_x * sensitivity) * offset_decay).clamp(-1.0, 1.0);
        t.offset_y = ((t.offset_y + t.velocity_y * sensitivity) * offset_decay).clamp(-1.0, 1.0);
    }

    /// Latest signal.
    pub fn signal(&self) -> MotionSignal {
        self.signal
    }

    pub fn translation(&self) -> TranslationState {
        self.signal.translation
    }

    pub fn mode(&self) -> StabilizationMode {
        self.mode
    }

    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    /// Samples that produced a signal since the last start.
    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Non-finite samples rejected since the last start.
    pub fn samples_dropped(&self) -> u64 {
        self.samples_dropped
    }

    /// Per-axis `|offset| + c * |velocity|`, `c = offset_decay * sensitivity / (1 - velocity_decay)`.
    ///
    /// Under zero acceleration neither component can grow, so this bounds
    /// how far the offset can still travel before settling at zero.
    pub fn settling_magnitude(&self) -> (f64, f64) {
        let s = &self.settings;
        let c = s.offset_decay * s.sensitivity / (1.0 - s.velocity_decay);
        let t = &self.signal.translation;
        (
            t.offset_x.abs() + c * t.velocity_x.abs(),
            t.offset_y.abs() + c * t.velocity_y.abs(),
        )
    }

    fn reset(&mut self) {
        self.signal = MotionSignal::NEUTRAL;
        self.samples_seen = 0;
        self.samples_dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_4, PI};

    use super::*;

    const TICK_NS: u64 = 8_333_333;

    fn translating() -> MotionEstimator {
        let mut estimator =
            MotionEstimator::new(MotionSettings::default(), StabilizationMode::RollAndTranslation);
        estimator.start(true);
        estimator
    }

    fn still(t: u64) -> MotionSample {
        MotionSample::still_at_roll(t, 0.0)
    }

    fn jerk(t: u64, ax: f64, ay: f64) -> MotionSample {
        MotionSample::new(t, Vec3::new(0.0, -1.0, 0.0), Vec3::new(ax, ay, 0.0))
    }

    #[test]
    fn test_reports_roll_from_gravity() {
        let mut estimator = translating();
        let signal = estimator.on_sample(&MotionSample::still_at_roll(42, FRAC_PI_4));
        assert!((signal.roll() - FRAC_PI_4).abs() < 1e-12);
        assert_eq!(signal.orientation.captured_at_ns, 42);
    }

    #[test]
    fn test_roll_is_continuous_across_the_seam() {
        let mut estimator = translating();
        let a = estimator.on_sample(&MotionSample::still_at_roll(0, PI - 0.001)).roll();
        let b = estimator.on_sample(&MotionSample::still_at_roll(1, -PI + 0.001)).roll();
        assert!(crate::roll::angle_delta(a, b).abs() < 0.0021);
    }

    #[test]
    fn test_rightward_jerk_shifts_offset_left_then_decays() {
        let mut estimator = translating();
        let signal = estimator.on_sample(&jerk(0, 5.0, 0.0));
        assert!(signal.translation.velocity_x < 0.0);
        assert!(signal.translation.offset_x < 0.0);

        // Three seconds of stillness at 120 Hz.
        for i in 1..=360 {
            estimator.on_sample(&still(i * TICK_NS));
        }
        let t = estimator.translation();
        assert!(t.offset_x.abs() < 1e-3, "offset did not settle: {}", t.offset_x);
        assert!(t.velocity_x.abs() < 1e-9);
    }

    #[test]
    fn test_upward_jerk_shifts_sensor_offset_down() {
        let mut estimator = translating();
        let signal = estimator.on_sample(&jerk(0, 0.0, 5.0));
        assert!(signal.translation.offset_y < 0.0);
        assert_eq!(signal.translation.offset_x, 0.0);
    }

    #[test]
    fn test_offset_is_clamped_under_sustained_push() {
        let mut estimator = translating();
        for i in 0..240 {
            let s = estimator.on_sample(&jerk(i * TICK_NS, -200.0, 200.0));
            assert!(s.translation.offset_x.abs() <= 1.0);
            assert!(s.translation.offset_y.abs() <= 1.0);
        }
        let t = estimator.translation();
        assert_eq!(t.offset_x, 1.0);
        assert_eq!(t.offset_y, -1.0);
    }

    #[test]
    fn test_roll_only_mode_never_integrates() {
        let mut estimator =
            MotionEstimator::new(MotionSettings::default(), StabilizationMode::RollOnly);
        estimator.start(true);
        estimator.on_sample(&jerk(0, 50.0, 50.0));
        assert!(estimator.translation().is_zero());
    }

    #[test]
    fn test_stop_then_start_is_a_clean_baseline() {
        let mut estimator = translating();
        for i in 0..10 {
            estimator.on_sample(&jerk(i * TICK_NS, 3.0, -2.0));
        }
        assert!(!estimator.translation().is_zero());

        estimator.stop();
        estimator.start(true);
        assert!(estimator.translation().is_zero());
        assert_eq!(estimator.signal(), MotionSignal::NEUTRAL);
        assert_eq!(estimator.samples_seen(), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut estimator = translating();
        estimator.on_sample(&jerk(0, 1.0, 1.0));
        estimator.stop();
        estimator.stop();
        assert!(!estimator.is_active());
        assert_eq!(estimator.signal(), MotionSignal::NEUTRAL);
    }

    #[test]
    fn test_unavailable_sensor_degrades_to_neutral() {
        let mut estimator =
            MotionEstimator::new(MotionSettings::default(), StabilizationMode::RollAndTranslation);
        assert!(!estimator.start(false));
        let signal = estimator.on_sample(&MotionSample::still_at_roll(0, 1.0));
        assert_eq!(signal, MotionSignal::NEUTRAL);
    }

    #[test]
    fn test_non_finite_samples_are_dropped() {
        let mut estimator = translating();
        estimator.on_sample(&MotionSample::still_at_roll(0, 0.5));
        let before = estimator.signal();
        let signal = estimator.on_sample(&MotionSample::new(
            1,
            Vec3::new(f64::NAN, -1.0, 0.0),
            Vec3::ZERO,
        ));
        assert_eq!(signal, before);
        assert_eq!(estimator.samples_dropped(), 1);
    }
}
