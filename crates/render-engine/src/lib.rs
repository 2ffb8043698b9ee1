//! LevelCam Render Engine
//!
//! Applies one crop geometry to the two consumers that must agree on it:
//! the on-screen preview and the frames written to storage.
//!
//! # Pipeline Architecture
//!
//! ```text
//! motion signal ──┐
//!                 ├── compute_crop_rect ──┬── DisplayTransform ──► preview compositor
//! container size ─┘                       │
//!                                         └── sampling region
//!                                                   │
//! camera frame ─────────────────────────────────────┤
//!                                                   ├── rotate by the crop angle
//!                                                   ├── crop to the level window
//!                                                   ▼
//!                                               FrameSink
//! ```

pub mod compositor;
pub mod export;

pub use compositor::*;
pub use export::*;
