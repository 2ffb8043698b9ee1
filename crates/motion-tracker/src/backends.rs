//! Motion sensing backend implementations.
//!
//! Each backend stands in for a different source of gravity / acceleration
//! readings. The tracker polls one sample per tick.

use std::path::Path;

use levelcam_common::error::{LevelcamError, LevelcamResult};
use levelcam_crop_model::signal::{parse_samples, MotionSample, Vec3};

use crate::MotionBackend;

/// Backend for hosts without a motion sensor.
pub struct StubBackend {
    available: bool,
}

impl StubBackend {
    /// A sensor that reports itself missing.
    pub fn unavailable() -> Self {
        Self { available: false }
    }

    /// A sensor that is present but never produces samples.
    pub fn empty() -> Self {
        Self { available: true }
    }
}

impl MotionBackend for StubBackend {
    fn poll(&mut self) -> LevelcamResult<Option<MotionSample>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Replays pre-recorded samples, one per poll.
pub struct ScriptedBackend {
    samples: Vec<MotionSample>,
    index: usize,
    repeat: bool,
}

impl ScriptedBackend {
    pub fn new(samples: Vec<MotionSample>) -> Self {
        Self {
            samples,
            index: 0,
            repeat: false,
        }
    }

    /// Start over from the first sample once the script runs out.
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Load a JSONL motion capture.
    pub fn from_jsonl_file(path: impl AsRef<Path>) -> LevelcamResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LevelcamError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let samples = parse_samples(&content)?;
        tracing::debug!(count = samples.len(), path = %path.display(), "Loaded motion script");
        Ok(Self::new(samples))
    }

    pub fn remaining(&self) -> usize {
        self.samples.len().saturating_sub(self.index)
    }
}

impl MotionBackend for ScriptedBackend {
    fn poll(&mut self) -> LevelcamResult<Option<MotionSample>> {
        if self.index >= self.samples.len() {
            if !self.repeat || self.samples.is_empty() {
                return Ok(None);
            }
            self.index = 0;
        }
        let sample = self.samples[self.index];
        self.index += 1;
        Ok(Some(sample))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Synthetic tilt sweep with an optional lateral jerk.
///
/// Roll follows `amplitude * sin(2π t / period)`. A jerk applies a constant
/// acceleration along device x for a number of ticks starting at `start_tick`.
pub struct SyntheticBackend {
    amplitude: f64,
    period_secs: f64,
    interval_ns: u64,
    jerk: Option<Jerk>,
    tick: u64,
}

/// A burst of lateral acceleration for [`SyntheticBackend`].
#[derive(Debug, Clone, Copy)]
pub struct Jerk {
    pub start_tick: u64,
    pub ticks: u64,
    pub acceleration: f64,
}

impl SyntheticBackend {
    pub fn new(amplitude: f64, period_secs: f64, sample_rate_hz: u32) -> Self {
        Self {
            amplitude,
            period_secs: period_secs.max(1e-3),
            interval_ns: 1_000_000_000 / sample_rate_hz.max(1) as u64,
            jerk: None,
            tick: 0,
        }
    }

    pub fn with_jerk(mut self, jerk: Jerk) -> Self {
        self.jerk = Some(jerk);
        self
    }

    /// The sample for a given tick, without advancing.
    pub fn sample_at(&self, tick: u64) -> MotionSample {
        let t_ns = tick * self.interval_ns;
        let t_secs = t_ns as f64 / 1_000_000_000.0;
        let roll = self.amplitude * (std::f64::consts::TAU * t_secs / self.period_secs).sin();

        let ax = match self.jerk {
            Some(j) if tick >= j.start_tick && tick < j.start_tick + j.ticks => j.acceleration,
            _ => 0.0,
        };

        MotionSample::new(
            t_ns,
            Vec3::new(roll.sin(), -roll.cos(), 0.0),
            Vec3::new(ax, 0.0, 0.0),
        )
    }
}

impl MotionBackend for SyntheticBackend {
    fn poll(&mut self) -> LevelcamResult<Option<MotionSample>> {
        let sample = self.sample_at(self.tick);
        self.tick += 1;
        Ok(Some(sample))
    }

    fn name(&self) -> &str {
        "synthetic"
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Detect the best available motion backend for the current system.
///
/// Desktop hosts have no motion sensor, so this reports an unavailable
/// stub and stabilization runs with a neutral signal.
pub fn detect_best_backend() -> Box<dyn MotionBackend> {
    tracing::warn!(
        "No motion sensor backend for this platform, crop stays level with the frame"
    );
    Box::new(StubBackend::unavailable())
}
