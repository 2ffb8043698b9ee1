//! LevelCam Motion Tracker
//!
//! Samples a motion backend at a fixed rate on a background task, runs the
//! [`MotionEstimator`] and publishes the resulting [`MotionSignal`] with
//! latest-wins semantics. Backends are pluggable:
//!
//! - **Synthetic:** Generated tilt sweeps and jerks
//! - **Scripted:** JSONL motion captures replayed sample by sample
//! - **Stub:** No sensor; the signal stays neutral
//!
//! Readers copy the whole signal out of a `watch` channel, so a render tick
//! never sees a roll from one sample paired with an offset from another.

pub mod backends;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use levelcam_common::clock::tick_period;
use levelcam_common::config::{MotionSettings, StabilizationMode};
use levelcam_common::error::{LevelcamError, LevelcamResult};
use levelcam_crop_model::signal::{MotionSample, MotionSignal};
use levelcam_processing_core::estimator::MotionEstimator;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Trait for motion sensing backends.
pub trait MotionBackend: Send {
    /// Poll for the next sample. Returns `None` if no sample is available.
    fn poll(&mut self) -> LevelcamResult<Option<MotionSample>>;

    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Check if the sensor is present on this system.
    fn is_available(&self) -> bool;
}

/// Owns the sampling task and the published signal.
pub struct MotionTracker {
    settings: MotionSettings,
    mode: StabilizationMode,
    signal_tx: Arc<watch::Sender<MotionSignal>>,
    signal_rx: watch::Receiver<MotionSignal>,
    stop_flag: Arc<AtomicBool>,
    samples_processed: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl MotionTracker {
    /// Create an idle tracker publishing the neutral signal.
    pub fn new(settings: MotionSettings, mode: StabilizationMode) -> Self {
        let (signal_tx, signal_rx) = watch::channel(MotionSignal::NEUTRAL);
        Self {
            settings,
            mode,
            signal_tx: Arc::new(signal_tx),
            signal_rx,
            stop_flag: Arc::new(AtomicBool::new(true)),
            samples_processed: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    /// Start sampling `backend` on the current tokio runtime.
    ///
    /// Returns `Ok(false)` when the sensor is unavailable: the tracker then
    /// keeps publishing the neutral signal. A running tracker is stopped and
    /// restarted from a clean baseline.
    pub fn start(&mut self, backend: Box<dyn MotionBackend>) -> LevelcamResult<bool> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LevelcamError::motion(format!("Motion tracker needs a tokio runtime: {e}")))?;

        self.stop();

        let rate_hz = self.settings.sample_rate_hz;
        let period = tick_period(rate_hz).ok_or_else(|| {
            LevelcamError::motion(format!("Cannot sample motion at {rate_hz} Hz"))
        })?;

        let mut estimator = MotionEstimator::new(self.settings.clone(), self.mode);
        if !estimator.start(backend.is_available()) {
            tracing::warn!(backend = %backend.name(), "Motion backend unavailable, signal stays neutral");
            return Ok(false);
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        self.stop_flag = stop_flag.clone();
        self.samples_processed.store(0, Ordering::SeqCst);

        tracing::info!(
            backend = %backend.name(),
            rate_hz,
            mode = ?self.mode,
            "Motion tracker started"
        );

        self.task = Some(runtime.spawn(sample_loop(
            backend,
            estimator,
            self.signal_tx.clone(),
            stop_flag,
            self.samples_processed.clone(),
            period,
        )));
        Ok(true)
    }

    /// Stop sampling and publish the neutral signal before returning.
    ///
    /// Idempotent. A publish that races this call is rejected, so readers
    /// never see a pre-stop value afterwards.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!(
                samples = self.samples_processed.load(Ordering::SeqCst),
                "Motion tracker stopped"
            );
        }
        self.signal_tx.send_replace(MotionSignal::NEUTRAL);
    }

    /// Latest signal snapshot (non-blocking).
    pub fn signal(&self) -> MotionSignal {
        *self.signal_rx.borrow()
    }

    /// A receiver for render loops that want change notifications.
    pub fn subscribe(&self) -> watch::Receiver<MotionSignal> {
        self.signal_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Samples fed to the estimator since the last start.
    pub fn samples_processed(&self) -> u64 {
        self.samples_processed.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> StabilizationMode {
        self.mode
    }
}

impl Drop for MotionTracker {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Background task: poll one sample per tick, run the estimator, publish.
async fn sample_loop(
    mut backend: Box<dyn MotionBackend>,
    mut estimator: MotionEstimator,
    signal_tx: Arc<watch::Sender<MotionSignal>>,
    stop_flag: Arc<AtomicBool>,
    samples_processed: Arc<AtomicU64>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if stop_flag.load(Ordering::SeqCst) {
            break;
        }

        match backend.poll() {
            Ok(Some(sample)) => {
                let signal = estimator.on_sample(&sample);
                // The flag is checked under the channel lock that `stop` also takes.
                let published = signal_tx.send_if_modified(|current| {
                    if stop_flag.load(Ordering::SeqCst) {
                        return false;
                    }
                    *current = signal;
                    true
                });
                if !published && stop_flag.load(Ordering::SeqCst) {
                    break;
                }

                let count = samples_processed.fetch_add(1, Ordering::SeqCst) + 1;
                if count % 1200 == 0 {
                    tracing::debug!(count, roll = signal.roll(), "Motion samples processed");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Motion backend error");
            }
        }
    }

    estimator.stop();
}
