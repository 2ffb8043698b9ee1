//! Validate the configuration and print effective settings.

use std::path::PathBuf;

use levelcam_common::config::{config_file_path, AppConfig};
use levelcam_crop_model::crop::compute_crop_rect;
use levelcam_motion_tracker::backends::detect_best_backend;

pub fn run(config: &AppConfig, explicit_path: Option<PathBuf>) -> anyhow::Result<()> {
    println!("LevelCam Configuration Check");
    println!("{}", "=".repeat(50));

    let path = explicit_path.unwrap_or_else(config_file_path);
    if path.exists() {
        println!("[OK] Config file: {}", path.display());
    } else {
        println!("[WARN] Config file: {} (not found, using defaults)", path.display());
    }

    let motion = &config.motion;
    let crop = &config.crop;
    println!();
    println!("Mode: {:?}", config.mode);
    println!("Motion:");
    println!(
        "     {} Hz, velocity decay {}, offset decay {}, sensitivity {}",
        motion.sample_rate_hz, motion.velocity_decay, motion.offset_decay, motion.sensitivity
    );
    println!("Crop:");
    println!(
        "     inset {}, damping {}, sampling expansion {}",
        crop.inset_factor, crop.damping_factor, crop.sampling_expansion
    );
    println!("Capture:");
    println!(
        "     {} fps to {}, stale signal after {} ms",
        config.capture.fps,
        config.capture.output_dir.display(),
        config.capture.max_signal_age_ms
    );

    // Example geometry for a 1080x1920 portrait preview.
    if let Some(rect) = compute_crop_rect(1080.0, 1920.0, 0.0, None, crop) {
        println!(
            "     1080x1920 preview -> {:.1} x {:.1} crop",
            rect.width(),
            rect.height()
        );
    }

    println!();
    let backend = detect_best_backend();
    if backend.is_available() {
        println!("[OK] Motion sensor: {}", backend.name());
    } else {
        println!("[WARN] Motion sensor: none (crops stay level with the frame)");
    }

    println!();
    match config.validate() {
        Ok(()) => {
            println!("Configuration is valid.");
            Ok(())
        }
        Err(e) => {
            println!("[FAIL] {e}");
            anyhow::bail!("Invalid configuration")
        }
    }
}
