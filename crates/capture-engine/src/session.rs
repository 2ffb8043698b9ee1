//! Stabilization session management.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use levelcam_common::clock::{tick_period, RateController, SessionClock, SignalAge};
use levelcam_common::config::{AppConfig, CaptureSettings, CropSettings, StabilizationMode};
use levelcam_common::error::{LevelcamError, LevelcamResult};
use levelcam_crop_model::crop::{crop_for_signal, Size};
use levelcam_crop_model::signal::MotionSignal;
use levelcam_motion_tracker::{MotionBackend, MotionTracker};
use levelcam_render_engine::{compose, crop_frame, DisplayTransform, FrameSink};

use crate::source::{Frame, FrameSource};

/// State of a stabilization session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session created but not started.
    Idle,
    /// Motion tracking active; frames are accepted.
    Running,
    /// Stopped; state has been reset.
    Stopped,
}

/// Frame counters since the last start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_received: u64,
    pub frames_rendered: u64,
    pub frames_persisted: u64,
    pub frames_skipped: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    received: AtomicU64,
    rendered: AtomicU64,
    persisted: AtomicU64,
    skipped: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> FrameStats {
        FrameStats {
            frames_received: self.received.load(Ordering::SeqCst),
            frames_rendered: self.rendered.load(Ordering::SeqCst),
            frames_persisted: self.persisted.load(Ordering::SeqCst),
            frames_skipped: self.skipped.load(Ordering::SeqCst),
        }
    }

    fn reset(&self) {
        for counter in [&self.received, &self.rendered, &self.persisted, &self.skipped] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

/// Ties the motion tracker to the preview and persistence paths.
///
/// Every frame reads the signal exactly once, so the preview and the
/// stored frame for a tick are built from the same roll and offset.
pub struct StabilizationSession {
    mode: StabilizationMode,
    crop: CropSettings,
    capture: CaptureSettings,
    state: SessionState,
    tracker: MotionTracker,
    clock: Option<SessionClock>,
    stop_flag: Arc<AtomicBool>,
    latest_frame: Mutex<Option<Frame>>,
    stats: StatCounters,
    stale_warning_gate: Mutex<RateController>,
}

impl StabilizationSession {
    /// Create an idle session from the application config.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            mode: config.mode,
            crop: config.crop.clone(),
            capture: config.capture.clone(),
            state: SessionState::Idle,
            tracker: MotionTracker::new(config.motion.clone(), config.mode),
            clock: None,
            stop_flag: Arc::new(AtomicBool::new(true)),
            latest_frame: Mutex::new(None),
            stats: StatCounters::default(),
            // At most one staleness warning per second of footage.
            stale_warning_gate: Mutex::new(RateController::new(1)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> StabilizationMode {
        self.mode
    }

    /// Start motion tracking. A running session is restarted from scratch.
    ///
    /// Returns `Ok(false)` when the sensor is unavailable; the session still
    /// runs and crops stay level with the frame.
    pub fn start(&mut self, backend: Box<dyn MotionBackend>) -> LevelcamResult<bool> {
        if self.state == SessionState::Running {
            self.stop();
        }

        tracing::info!(mode = ?self.mode, backend = %backend.name(), "Starting stabilization session");
        let sensing = self.tracker.start(backend)?;

        self.stats.reset();
        if let Ok(mut gate) = self.stale_warning_gate.lock() {
            gate.reset();
        }
        let clock = SessionClock::start();
        tracing::debug!(epoch = %clock.epoch_wall(), "Session clock started");
        self.clock = Some(clock);
        self.stop_flag.store(false, Ordering::SeqCst);
        self.state = SessionState::Running;
        Ok(sensing)
    }

    /// Stop the session. Idempotent.
    ///
    /// The tracker is stopped and the frame slot cleared before this
    /// returns, so a later start begins from a clean state.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.tracker.stop();
        if let Ok(mut slot) = self.latest_frame.lock() {
            slot.take();
        }
        if self.state != SessionState::Running {
            return;
        }

        let stats = self.stats();
        let duration_secs = self.elapsed_secs();
        tracing::info!(
            duration_secs,
            received = stats.frames_received,
            persisted = stats.frames_persisted,
            skipped = stats.frames_skipped,
            "Stabilization session stopped"
        );
        self.state = SessionState::Stopped;
    }

    /// Get a clone of the stop flag for ending [`run_capture`] from elsewhere.
    ///
    /// [`run_capture`]: StabilizationSession::run_capture
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Session duration so far.
    pub fn elapsed_secs(&self) -> f64 {
        self.clock.as_ref().map(|c| c.elapsed_secs()).unwrap_or(0.0)
    }

    /// Latest published motion signal.
    pub fn signal(&self) -> MotionSignal {
        self.tracker.signal()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats.snapshot()
    }

    /// Offer a captured frame. The newest frame replaces any unconsumed one.
    pub fn submit_frame(&self, frame: Frame) {
        if self.state != SessionState::Running {
            tracing::debug!(state = ?self.state, "Dropping frame outside a running session");
            return;
        }
        self.stats.received.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.latest_frame.lock() {
            if slot.replace(frame).is_some() {
                tracing::trace!("Unconsumed frame replaced");
            }
        }
    }

    /// Take the newest submitted frame, if any.
    pub fn take_latest_frame(&self) -> Option<Frame> {
        self.latest_frame.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Compute the preview transform for this tick.
    ///
    /// Returns `None` (and counts a skip) for a degenerate container; the
    /// preview keeps its previous transform.
    pub fn render_tick(&self, container: Size) -> Option<DisplayTransform> {
        let signal = self.tracker.signal();
        match compose(container, &signal, self.mode, &self.crop) {
            Some(transform) => {
                self.stats.rendered.fetch_add(1, Ordering::SeqCst);
                Some(transform)
            }
            None => {
                self.stats.skipped.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    width = container.width,
                    height = container.height,
                    "Skipping preview tick with degenerate geometry"
                );
                None
            }
        }
    }

    /// Crop one frame with the current signal and write it to `sink`.
    ///
    /// Returns `Ok(false)` when the frame was skipped for degenerate
    /// geometry. Sink failures are returned as errors.
    pub fn persist_frame(&self, frame: &Frame, sink: &mut dyn FrameSink) -> LevelcamResult<bool> {
        let signal = self.tracker.signal();
        self.check_signal_age(&signal, frame);

        let (width, height) = frame.dimensions();
        let Some(crop) = crop_for_signal(
            Size::new(width as f64, height as f64),
            &signal,
            self.mode,
            &self.crop,
        ) else {
            return Ok(self.skip_frame(frame, "degenerate crop"));
        };

        let cropped = match crop_frame(&frame.image, &crop, self.crop.sampling_expansion) {
            Ok(image) => image,
            Err(LevelcamError::Geometry { message }) => {
                return Ok(self.skip_frame(frame, &message));
            }
            Err(e) => return Err(e),
        };

        sink.write_frame(&cropped, frame.captured_at_ns)?;
        self.stats.persisted.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    /// Pull frames from `source` at `fps` and persist the newest one each
    /// tick, until the source ends or the stop flag is raised.
    ///
    /// The sink is finished on every exit, including a source or sink
    /// error, which is returned after the sink is closed.
    pub async fn run_capture(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        fps: u32,
    ) -> LevelcamResult<FrameStats> {
        if self.state != SessionState::Running {
            return Err(LevelcamError::capture("Session not running"));
        }
        let fps = if fps == 0 { self.capture.fps } else { fps };
        let period = tick_period(fps)
            .ok_or_else(|| LevelcamError::capture(format!("Cannot capture at {fps} fps")))?;
        let (width, height) = source.frame_size();
        tracing::info!(
            source = %source.name(),
            sink = %sink.name(),
            width,
            height,
            fps,
            "Capture loop started"
        );

        let outcome = self.capture_loop(source, sink, period).await;
        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "Capture loop failed, finishing sink");
        }

        let finished = sink.finish();
        let stats = self.stats();
        tracing::info!(
            written = ?finished.as_ref().ok(),
            received = stats.frames_received,
            skipped = stats.frames_skipped,
            "Capture loop finished"
        );
        outcome?;
        finished?;
        Ok(stats)
    }

    async fn capture_loop(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        period: Duration,
    ) -> LevelcamResult<()> {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if self.stop_flag.load(Ordering::SeqCst) {
                tracing::debug!("Capture loop stopped by flag");
                return Ok(());
            }

            match source.next_frame()? {
                Some(frame) => self.submit_frame(frame),
                None => {
                    tracing::debug!(source = %source.name(), "Frame source ended");
                    return Ok(());
                }
            }

            if let Some(frame) = self.take_latest_frame() {
                self.persist_frame(&frame, sink)?;
            }
        }
    }

    fn skip_frame(&self, frame: &Frame, reason: &str) -> bool {
        self.stats.skipped.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            captured_at_ns = frame.captured_at_ns,
            reason,
            "Skipping frame"
        );
        false
    }

    fn check_signal_age(&self, signal: &MotionSignal, frame: &Frame) {
        let sample_ns = signal.orientation.captured_at_ns;
        if sample_ns == 0 || frame.captured_at_ns == 0 {
            return;
        }
        let age = SignalAge {
            sample_ns,
            frame_ns: frame.captured_at_ns,
        };
        if !age.exceeds_threshold_ms(self.capture.max_signal_age_ms) {
            return;
        }
        let should_warn = self
            .stale_warning_gate
            .lock()
            .map(|mut gate| gate.should_tick(frame.captured_at_ns))
            .unwrap_or(false);
        if should_warn {
            tracing::warn!(
                age_ms = age.age_ms(),
                threshold_ms = self.capture.max_signal_age_ms,
                "Orientation signal is stale for this frame"
            );
        }
    }
}

impl Drop for StabilizationSession {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use levelcam_motion_tracker::backends::StubBackend;
    use levelcam_render_engine::MemorySink;

    use super::*;
    use crate::source::SyntheticFrameSource;

    fn frame(width: u32, height: u32, t: u64) -> Frame {
        Frame::new(image::RgbaImage::new(width, height), t)
    }

    /// Yields `good` frames, then fails.
    struct FailingSource {
        good: u64,
    }

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> LevelcamResult<Option<Frame>> {
            if self.good == 0 {
                return Err(LevelcamError::capture("camera disconnected"));
            }
            self.good -= 1;
            Ok(Some(frame(30, 40, 1)))
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn frame_size(&self) -> (u32, u32) {
            (30, 40)
        }
    }

    #[derive(Default)]
    struct FinishCountingSink {
        inner: MemorySink,
        finished: u32,
    }

    impl FrameSink for FinishCountingSink {
        fn write_frame(&mut self, image: &image::RgbaImage, timestamp_ns: u64) -> LevelcamResult<()> {
            self.inner.write_frame(image, timestamp_ns)
        }

        fn finish(&mut self) -> LevelcamResult<u64> {
            self.finished += 1;
            self.inner.finish()
        }

        fn name(&self) -> &str {
            "finish-counting"
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = StabilizationSession::new(&AppConfig::default());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.stats(), FrameStats::default());
        assert_eq!(session.signal(), MotionSignal::NEUTRAL);
    }

    #[test]
    fn test_frames_are_dropped_when_not_running() {
        let session = StabilizationSession::new(&AppConfig::default());
        session.submit_frame(frame(4, 4, 1));
        assert!(session.take_latest_frame().is_none());
        assert_eq!(session.stats().frames_received, 0);
    }

    #[test]
    fn test_idle_render_tick_is_level() {
        let session = StabilizationSession::new(&AppConfig::default());
        let transform = session.render_tick(Size::new(300.0, 400.0)).unwrap();
        assert_eq!(transform.crop.rotation, 0.0);
        assert_eq!(session.stats().frames_rendered, 1);
    }

    #[test]
    fn test_degenerate_container_counts_a_skip() {
        let session = StabilizationSession::new(&AppConfig::default());
        assert!(session.render_tick(Size::new(300.0, 0.0)).is_none());
        assert_eq!(session.stats().frames_skipped, 1);
    }

    #[test]
    fn test_empty_frame_is_skipped_not_written() {
        let session = StabilizationSession::new(&AppConfig::default());
        let mut sink = MemorySink::new();
        assert!(!session.persist_frame(&frame(0, 0, 5), &mut sink).unwrap());
        assert!(sink.frames.is_empty());
        assert_eq!(session.stats().frames_skipped, 1);
    }

    #[tokio::test]
    async fn test_latest_frame_wins() {
        let mut session = StabilizationSession::new(&AppConfig::default());
        session.start(Box::new(StubBackend::empty())).unwrap();
        session.submit_frame(frame(4, 4, 1));
        session.submit_frame(frame(4, 4, 2));
        assert_eq!(session.take_latest_frame().unwrap().captured_at_ns, 2);
        assert!(session.take_latest_frame().is_none());
        assert_eq!(session.stats().frames_received, 2);
        session.stop();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_clears_slot() {
        let mut session = StabilizationSession::new(&AppConfig::default());
        session.start(Box::new(StubBackend::empty())).unwrap();
        session.submit_frame(frame(4, 4, 1));

        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.take_latest_frame().is_none());
        assert_eq!(session.signal(), MotionSignal::NEUTRAL);
    }

    #[tokio::test]
    async fn test_run_capture_requires_running_session() {
        let session = StabilizationSession::new(&AppConfig::default());
        let mut source = SyntheticFrameSource::new(8, 8, 30).unwrap().with_limit(1);
        let mut sink = MemorySink::new();
        assert!(session.run_capture(&mut source, &mut sink, 30).await.is_err());
    }

    #[tokio::test]
    async fn test_unrepresentable_fps_is_an_error() {
        let mut session = StabilizationSession::new(&AppConfig::default());
        session.start(Box::new(StubBackend::empty())).unwrap();
        let mut source = SyntheticFrameSource::new(8, 8, 30).unwrap().with_limit(1);
        let mut sink = FinishCountingSink::default();

        let err = session
            .run_capture(&mut source, &mut sink, 2_000_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, LevelcamError::Capture { .. }));
        assert_eq!(sink.finished, 0);
        session.stop();
    }

    #[tokio::test]
    async fn test_source_error_still_finishes_sink() {
        let mut session = StabilizationSession::new(&AppConfig::default());
        session.start(Box::new(StubBackend::empty())).unwrap();
        let mut source = FailingSource { good: 2 };
        let mut sink = FinishCountingSink::default();

        let err = session
            .run_capture(&mut source, &mut sink, 1000)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("camera disconnected"));
        assert_eq!(sink.finished, 1);
        assert_eq!(sink.inner.frames.len(), 2);
        session.stop();
    }

    #[tokio::test]
    async fn test_restart_resets_stats() {
        let mut session = StabilizationSession::new(&AppConfig::default());
        session.start(Box::new(StubBackend::empty())).unwrap();
        session.submit_frame(frame(4, 4, 1));
        session.stop();
        session.start(Box::new(StubBackend::empty())).unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.stats(), FrameStats::default());
        session.stop();
    }
}
