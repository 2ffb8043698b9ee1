//! LevelCam Common Utilities
//!
//! Shared infrastructure for all LevelCam crates:
//! - Error types and result aliases
//! - Clock and rate utilities for the motion and frame producers
//! - Tracing/logging initialization
//! - Configuration loading and validation

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
