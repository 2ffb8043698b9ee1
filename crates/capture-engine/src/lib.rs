//! LevelCam Capture Engine
//!
//! Runs stabilization sessions: the motion tracker publishes the latest
//! signal, frames arrive from a capture source, and each frame is either
//! drawn through the preview transform or cut and handed to a sink.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              StabilizationSession                │
//! │  ┌──────────────┐            ┌────────────────┐  │
//! │  │ MotionTracker│            │  FrameSource   │  │
//! │  │  (120 Hz)    │            │  (camera fps)  │  │
//! │  └──────┬───────┘            └───────┬────────┘  │
//! │         │ latest signal              │ latest    │
//! │         ▼                            ▼ frame     │
//! │  ┌──────────────┐            ┌────────────────┐  │
//! │  │ render_tick  │            │ persist_frame  │  │
//! │  │ (preview)    │            │ (FrameSink)    │  │
//! │  └──────────────┘            └────────────────┘  │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod session;
pub mod source;

pub use session::*;
pub use source::*;
