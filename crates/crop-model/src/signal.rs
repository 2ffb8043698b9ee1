//! Motion samples and the signal published by the motion subsystem.

use serde::{Deserialize, Serialize};

/// Monotonic timestamp in nanoseconds since session start.
pub type TimestampNs = u64;

/// A 3-axis vector in the device frame (x right, y up, z out of the screen).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// One reading from the motion collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Monotonic nanoseconds since session start.
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,

    /// Gravity projected into the device frame. Upright portrait is `(0, -1, 0)`.
    pub gravity: Vec3,

    /// Acceleration with gravity removed (m/s^2).
    #[serde(default)]
    pub user_acceleration: Vec3,
}

impl MotionSample {
    pub fn new(timestamp_ns: TimestampNs, gravity: Vec3, user_acceleration: Vec3) -> Self {
        Self {
            timestamp_ns,
            gravity,
            user_acceleration,
        }
    }

    /// Device held still at the given roll angle (radians, clockwise positive).
    pub fn still_at_roll(timestamp_ns: TimestampNs, roll: f64) -> Self {
        Self::new(
            timestamp_ns,
            Vec3::new(roll.sin(), -roll.cos(), 0.0),
            Vec3::ZERO,
        )
    }
}

/// Parse a JSONL stream of motion samples, skipping blank and `#` lines.
pub fn parse_samples(jsonl: &str) -> Result<Vec<MotionSample>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Device roll at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationSample {
    /// Roll in radians, in `(-PI, PI]`.
    pub roll: f64,

    /// Timestamp of the motion sample it was derived from.
    pub captured_at_ns: TimestampNs,
}

/// Leaky-integrator state for translation compensation.
///
/// Offsets are normalized to `[-1, 1]` in the sensor convention (up is +y).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TranslationState {
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl TranslationState {
    pub const ZERO: TranslationState = TranslationState {
        velocity_x: 0.0,
        velocity_y: 0.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// The normalized offset as `(x, y)`.
    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// The value published by the motion subsystem.
///
/// Orientation and translation travel together so a reader never pairs a
/// roll from one tick with an offset from another.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSignal {
    pub orientation: OrientationSample,
    pub translation: TranslationState,
}

impl MotionSignal {
    /// Level device, no translation.
    pub const NEUTRAL: MotionSignal = MotionSignal {
        orientation: OrientationSample {
            roll: 0.0,
            captured_at_ns: 0,
        },
        translation: TranslationState::ZERO,
    };

    pub fn roll(&self) -> f64 {
        self.orientation.roll
    }

    pub fn is_neutral(&self) -> bool {
        self.orientation.roll == 0.0 && self.translation.is_zero()
    }
}
