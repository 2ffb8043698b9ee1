use std::time::Duration;

use levelcam_common::config::{MotionSettings, StabilizationMode};
use levelcam_crop_model::signal::{MotionSample, MotionSignal, Vec3};
use levelcam_motion_tracker::backends::{Jerk, ScriptedBackend, StubBackend, SyntheticBackend};
use levelcam_motion_tracker::MotionTracker;

fn tilted_script(roll: f64, count: u64) -> ScriptedBackend {
    ScriptedBackend::new(
        (0..count)
            .map(|i| MotionSample::still_at_roll(i * 8_333_333, roll))
            .collect(),
    )
}

async fn wait_for<F: Fn(&MotionTracker) -> bool>(tracker: &MotionTracker, predicate: F) -> bool {
    for _ in 0..200 {
        if predicate(tracker) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn publishes_roll_from_backend() {
    let mut tracker = MotionTracker::new(MotionSettings::default(), StabilizationMode::RollOnly);
    assert!(tracker.start(Box::new(tilted_script(0.3, 5))).unwrap());

    assert!(wait_for(&tracker, |t| t.samples_processed() >= 5).await);
    assert!((tracker.signal().roll() - 0.3).abs() < 1e-9);
    tracker.stop();
}

#[tokio::test]
async fn unavailable_sensor_keeps_neutral_signal() {
    let mut tracker = MotionTracker::new(MotionSettings::default(), StabilizationMode::RollOnly);
    assert!(!tracker.start(Box::new(StubBackend::unavailable())).unwrap());
    assert!(!tracker.is_running());
    assert_eq!(tracker.signal(), MotionSignal::NEUTRAL);
}

#[tokio::test]
async fn stop_resets_signal_synchronously() {
    let mut tracker = MotionTracker::new(
        MotionSettings::default(),
        StabilizationMode::RollAndTranslation,
    );
    let backend = SyntheticBackend::new(0.4, 2.0, 120).with_jerk(Jerk {
        start_tick: 0,
        ticks: 20,
        acceleration: 5.0,
    });
    tracker.start(Box::new(backend)).unwrap();
    assert!(wait_for(&tracker, |t| !t.signal().translation.is_zero()).await);

    tracker.stop();
    assert_eq!(tracker.signal(), MotionSignal::NEUTRAL);

    // Give an aborted task the chance to misbehave.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(tracker.signal(), MotionSignal::NEUTRAL);
    assert!(!tracker.is_running());
}

#[tokio::test]
async fn restart_begins_from_zero_before_any_sample() {
    let mut tracker = MotionTracker::new(
        MotionSettings::default(),
        StabilizationMode::RollAndTranslation,
    );
    let jerky = ScriptedBackend::new(
        (0..10)
            .map(|i| {
                MotionSample::new(i * 8_333_333, Vec3::new(0.0, -1.0, 0.0), Vec3::new(4.0, 0.0, 0.0))
            })
            .collect(),
    );
    tracker.start(Box::new(jerky)).unwrap();
    assert!(wait_for(&tracker, |t| t.samples_processed() >= 10).await);
    assert!(tracker.signal().translation.offset_x < 0.0);

    tracker.stop();
    assert!(tracker.start(Box::new(StubBackend::empty())).unwrap());
    let signal = tracker.signal();
    assert_eq!(signal.translation.offset_x, 0.0);
    assert_eq!(signal.translation.offset_y, 0.0);
    assert_eq!(signal.translation.velocity_x, 0.0);
    assert_eq!(signal.translation.velocity_y, 0.0);
    assert_eq!(tracker.samples_processed(), 0);
    tracker.stop();
}

#[tokio::test]
async fn stop_is_idempotent() {
    let mut tracker = MotionTracker::new(MotionSettings::default(), StabilizationMode::RollOnly);
    tracker.stop();
    tracker.start(Box::new(tilted_script(0.1, 3))).unwrap();
    tracker.stop();
    tracker.stop();
    assert_eq!(tracker.signal(), MotionSignal::NEUTRAL);
}

#[tokio::test]
async fn subscribers_see_latest_value() {
    let mut tracker = MotionTracker::new(MotionSettings::default(), StabilizationMode::RollOnly);
    let mut rx = tracker.subscribe();
    tracker.start(Box::new(tilted_script(-0.5, 3))).unwrap();

    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .expect("signal should change")
        .expect("sender alive");
    assert!(wait_for(&tracker, |t| t.samples_processed() >= 3).await);
    assert!((rx.borrow_and_update().roll() + 0.5).abs() < 1e-9);
    tracker.stop();
}

#[test]
fn start_without_runtime_is_an_error() {
    let mut tracker = MotionTracker::new(MotionSettings::default(), StabilizationMode::RollOnly);
    assert!(tracker.start(Box::new(StubBackend::empty())).is_err());
}

#[tokio::test]
async fn unrepresentable_rate_is_an_error() {
    let settings = MotionSettings {
        sample_rate_hz: 3_000_000_000,
        ..MotionSettings::default()
    };
    let mut tracker = MotionTracker::new(settings, StabilizationMode::RollOnly);
    assert!(tracker.start(Box::new(tilted_script(0.3, 5))).is_err());
    assert!(!tracker.is_running());
    assert_eq!(tracker.signal(), MotionSignal::NEUTRAL);
}
