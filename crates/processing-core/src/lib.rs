//! LevelCam Processing Core: the motion estimator
//!
//! Turns raw motion samples into the stabilization signal:
//! - **Roll:** Full-circle device roll from the gravity vector, plus
//!   seam-safe unwrapping and interpolation
//! - **Estimator:** Per-tick roll and the leaky translation integrator
//!
//! This crate is pure computation with no I/O, threads or clocks.
//! All inputs are data; all outputs are data.

pub mod estimator;
pub mod roll;

pub use estimator::MotionEstimator;
pub use roll::{lerp_roll, roll_from_gravity, unwrap_roll};
