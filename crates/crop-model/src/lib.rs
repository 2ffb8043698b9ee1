//! LevelCam Crop Model
//!
//! Defines the core data contracts for horizon stabilization:
//! - **Signal:** Raw motion samples and the published orientation/translation signal
//! - **Crop:** The pure function that turns a container size and the latest
//!   signal into a level, 3:4 crop rectangle
//!
//! The crop is expressed relative to its container so the preview and the
//! persisted frame can resolve the same rectangle in their own pixel space.

pub mod crop;
pub mod signal;

pub use crop::*;
pub use signal::*;
