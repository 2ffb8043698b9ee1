//! Cut the level crop out of a single image.

use std::path::PathBuf;

use clap::Args;
use image::DynamicImage;
use levelcam_common::config::AppConfig;
use levelcam_crop_model::crop::compute_crop_rect;
use levelcam_render_engine::crop_frame;

#[derive(Debug, Args)]
pub struct CropArgs {
    /// Input image
    pub input: PathBuf,

    /// Output image (format from extension)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Device roll; radians unless --degrees is given
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub roll: f64,

    /// Interpret --roll in degrees
    #[arg(long)]
    pub degrees: bool,

    /// Normalized horizontal offset in [-1, 1] (enables translation)
    #[arg(long, allow_hyphen_values = true)]
    pub offset_x: Option<f64>,

    /// Normalized vertical offset in [-1, 1], up is positive (enables translation)
    #[arg(long, allow_hyphen_values = true)]
    pub offset_y: Option<f64>,
}

pub fn run(config: &AppConfig, args: CropArgs) -> anyhow::Result<()> {
    config.validate()?;
    let roll = if args.degrees {
        args.roll.to_radians()
    } else {
        args.roll
    };
    let offset = match (args.offset_x, args.offset_y) {
        (None, None) => None,
        (x, y) => Some((x.unwrap_or(0.0), y.unwrap_or(0.0))),
    };

    let frame = image::open(&args.input)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", args.input.display()))?
        .to_rgba8();
    let (width, height) = frame.dimensions();

    let rect = compute_crop_rect(width as f64, height as f64, roll, offset, &config.crop)
        .ok_or_else(|| anyhow::anyhow!("No crop for a {width}x{height} image at roll {roll}"))?;
    let cropped = crop_frame(&frame, &rect, config.crop.sampling_expansion)?;

    let is_jpeg = args
        .output
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));
    let save_result = if is_jpeg {
        DynamicImage::ImageRgba8(cropped.clone()).to_rgb8().save(&args.output)
    } else {
        cropped.save(&args.output)
    };
    save_result.map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", args.output.display()))?;

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        roll,
        "Crop written"
    );
    println!(
        "{}x{} -> {}x{} (rotation {:.2} deg)",
        width,
        height,
        cropped.width(),
        cropped.height(),
        rect.rotation.to_degrees()
    );
    Ok(())
}
