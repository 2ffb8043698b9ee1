//! Roll angle from the gravity vector.
//!
//! Roll is reported in `(-PI, PI]`. Consumers that interpolate or difference
//! roll values must go through [`unwrap_roll`] or [`lerp_roll`] so the seam at
//! `±PI` never shows up as a full turn.

use std::f64::consts::{PI, TAU};

/// Device roll from gravity projected onto the screen plane.
///
/// Upright portrait has gravity `(0, -1)` and a roll of zero. `atan2` covers
/// the full circle, including upside-down, without a dead zone.
pub fn roll_from_gravity(gx: f64, gy: f64) -> f64 {
    normalize_angle(gx.atan2(-gy))
}

/// Wrap an angle into `(-PI, PI]`.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in `(-PI, PI]`.
pub fn angle_delta(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// The representative of `next` (mod 2π) closest to `previous`.
///
/// Feeding each new sample through this keeps a roll track continuous, so
/// crossing the seam at `±PI` moves by a small step rather than `2π`.
pub fn unwrap_roll(previous: f64, next: f64) -> f64 {
    previous + angle_delta(previous, next)
}

/// Shortest-arc interpolation between two roll angles, normalized.
pub fn lerp_roll(a: f64, b: f64, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    normalize_angle(a + angle_delta(a, b) * t)
}
