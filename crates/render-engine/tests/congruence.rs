//! The preview window and the persisted frame must show the same content.

use levelcam_common::config::{CropSettings, StabilizationMode};
use levelcam_crop_model::crop::{crop_for_signal, Point2D, Size};
use levelcam_crop_model::signal::{MotionSignal, OrientationSample, TranslationState};
use levelcam_render_engine::{crop_frame, DisplayTransform};
use image::{Rgba, RgbaImage};

const FRAME_SCALE: f64 = 4.0;

fn ramp(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x as f64 * 255.0 / (width - 1) as f64).round() as u8,
            (y as f64 * 255.0 / (height - 1) as f64).round() as u8,
            0,
            255,
        ])
    })
}

fn signal(roll: f64, offset_x: f64, offset_y: f64) -> MotionSignal {
    MotionSignal {
        orientation: OrientationSample {
            roll,
            captured_at_ns: 0,
        },
        translation: TranslationState {
            offset_x,
            offset_y,
            ..TranslationState::ZERO
        },
    }
}

/// Checks that pixel (u, v) of the persisted crop shows the frame content
/// the preview places at crop-local (u, v) / FRAME_SCALE.
fn assert_paths_agree(signal: MotionSignal, mode: StabilizationMode) {
    let settings = CropSettings::default();
    let container = Size::new(90.0, 120.0);
    let (frame_w, frame_h) = (
        (container.width * FRAME_SCALE) as u32,
        (container.height * FRAME_SCALE) as u32,
    );
    let frame = ramp(frame_w, frame_h);

    let crop = crop_for_signal(container, &signal, mode, &settings).unwrap();
    let display = DisplayTransform::from_crop(&crop, container).unwrap();
    let persisted = crop_frame(&frame, &crop, settings.sampling_expansion).unwrap();

    // Same rectangle, up to the uniform scale between preview and frame.
    assert!((persisted.width() as f64 - display.crop.width * FRAME_SCALE).abs() <= 1.0);
    assert!((persisted.height() as f64 - display.crop.height * FRAME_SCALE).abs() <= 1.0);

    let margin = 12;
    for v in (margin..persisted.height() - margin).step_by(17) {
        for u in (margin..persisted.width() - margin).step_by(13) {
            let local = Point2D::new(u as f64 / FRAME_SCALE, v as f64 / FRAME_SCALE);
            let on_screen = display.layer_transform.apply(local);
            let expected_r = on_screen.x * FRAME_SCALE * 255.0 / (frame_w - 1) as f64;
            let expected_g = on_screen.y * FRAME_SCALE * 255.0 / (frame_h - 1) as f64;

            let px = persisted.get_pixel(u, v);
            assert!(px.0[3] >= 250, "pixel ({u}, {v}) fell outside the frame");
            assert!(
                (px.0[0] as f64 - expected_r).abs() <= 3.0,
                "red at ({u}, {v}): got {}, expected {expected_r:.1}",
                px.0[0]
            );
            assert!(
                (px.0[1] as f64 - expected_g).abs() <= 3.0,
                "green at ({u}, {v}): got {}, expected {expected_g:.1}",
                px.0[1]
            );
        }
    }
}

#[test]
fn level_crop_agrees() {
    assert_paths_agree(MotionSignal::NEUTRAL, StabilizationMode::RollOnly);
}

#[test]
fn tilted_crop_agrees() {
    assert_paths_agree(signal(0.35, 0.0, 0.0), StabilizationMode::RollOnly);
    assert_paths_agree(signal(-1.1, 0.0, 0.0), StabilizationMode::RollOnly);
}

#[test]
fn translated_crop_agrees() {
    assert_paths_agree(
        signal(0.2, 0.4, -0.3),
        StabilizationMode::RollAndTranslation,
    );
}

#[test]
fn upside_down_crop_agrees() {
    assert_paths_agree(signal(std::f64::consts::PI - 0.1, 0.0, 0.0), StabilizationMode::RollOnly);
}
