//! Persistence path: cut the level crop out of full-resolution frames.
//!
//! A rotated window cannot be cut from the frame directly. The frame is
//! first cropped to a square sampling region around the window, large
//! enough to hold it at any angle, then rotated about the window centre so
//! the window becomes upright, then cropped to the window.

use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use levelcam_common::error::{LevelcamError, LevelcamResult};
use levelcam_crop_model::crop::{CropRect, PlacedCrop, Point2D};

/// Smallest expansion that holds a 3:4 window at every angle with margin.
pub const MIN_SAMPLING_EXPANSION: f64 = std::f64::consts::SQRT_2;

/// Upper bound on the sampling square, to refuse runaway allocations.
pub const MAX_REGION_SIDE: u32 = 32_768;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Square area of the source frame sampled for one crop, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingRegion {
    /// Left edge; may be negative near the frame border.
    pub x: i64,
    /// Top edge; may be negative near the frame border.
    pub y: i64,
    pub side: u32,
}

impl SamplingRegion {
    /// Region of side `max(w, h) × expansion` centred on the crop.
    ///
    /// Expansions below [`MIN_SAMPLING_EXPANSION`] are raised to it.
    pub fn for_crop(crop: &PlacedCrop, expansion: f64) -> Option<Self> {
        let expansion = if expansion.is_finite() {
            expansion.max(MIN_SAMPLING_EXPANSION)
        } else {
            MIN_SAMPLING_EXPANSION
        };
        if !crop.center.x.is_finite() || !crop.center.y.is_finite() {
            return None;
        }
        let side = (crop.width.max(crop.height) * expansion).ceil();
        if !(side >= 1.0 && side <= MAX_REGION_SIDE as f64) {
            return None;
        }
        let side = side as u32;
        let half = side as f64 / 2.0;
        Some(Self {
            x: (crop.center.x - half).round() as i64,
            y: (crop.center.y - half).round() as i64,
            side,
        })
    }

    pub fn center(&self) -> Point2D {
        let half = self.side as f64 / 2.0;
        Point2D::new(self.x as f64 + half, self.y as f64 + half)
    }

    pub fn contains(&self, p: Point2D) -> bool {
        let (x0, y0) = (self.x as f64, self.y as f64);
        let (x1, y1) = (x0 + self.side as f64, y0 + self.side as f64);
        p.x >= x0 && p.x <= x1 && p.y >= y0 && p.y <= y1
    }

    /// Whether every corner of the rotated crop lies inside the region.
    pub fn covers(&self, crop: &PlacedCrop) -> bool {
        crop.corners().iter().all(|c| self.contains(*c))
    }

    /// Copy the region out of `frame`, filling outside pixels with
    /// transparent black.
    pub fn extract(&self, frame: &RgbaImage) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(self.side, self.side, TRANSPARENT);
        image::imageops::replace(&mut canvas, frame, -self.x, -self.y);
        canvas
    }
}

/// Cut the level crop window out of a full-resolution frame.
///
/// The crop is resolved against the frame's pixel size with the same
/// placement the preview uses, so the output shows exactly what the
/// preview window showed. Output size is the placed crop size, rounded.
pub fn crop_frame(frame: &RgbaImage, crop: &CropRect, expansion: f64) -> LevelcamResult<RgbaImage> {
    let placed = crop
        .place(frame.width() as f64, frame.height() as f64)
        .ok_or_else(|| {
            LevelcamError::geometry(format!(
                "Cannot place crop in a {}x{} frame",
                frame.width(),
                frame.height()
            ))
        })?;
    let region = SamplingRegion::for_crop(&placed, expansion).ok_or_else(|| {
        LevelcamError::geometry(format!(
            "No sampling region for a {:.1}x{:.1} crop",
            placed.width, placed.height
        ))
    })?;

    let out_w = (placed.width.round() as u32).clamp(1, region.side);
    let out_h = (placed.height.round() as u32).clamp(1, region.side);

    let canvas = region.extract(frame);
    // imageproc rotates clockwise on screen; undo the window's rotation.
    let upright = rotate_about_center(
        &canvas,
        -placed.rotation as f32,
        Interpolation::Bilinear,
        TRANSPARENT,
    );

    // The region is pixel-aligned, so the window centre sits up to half a
    // pixel off the region centre. Carry that through the rotation.
    let region_center = region.center();
    let drift = Point2D::new(
        placed.center.x - region_center.x,
        placed.center.y - region_center.y,
    )
    .rotated(-placed.rotation);
    let half = region.side as f64 / 2.0;
    let max_x = region.side - out_w;
    let max_y = region.side - out_h;
    let left = (half + drift.x - out_w as f64 / 2.0).round().max(0.0) as u32;
    let top = (half + drift.y - out_h as f64 / 2.0).round().max(0.0) as u32;

    tracing::trace!(
        region_side = region.side,
        out_w,
        out_h,
        rotation = placed.rotation,
        "Cropped frame"
    );

    Ok(image::imageops::crop_imm(&upright, left.min(max_x), top.min(max_y), out_w, out_h).to_image())
}

/// Destination for stabilized frames.
pub trait FrameSink: Send {
    /// Persist one cropped frame.
    fn write_frame(&mut self, image: &RgbaImage, timestamp_ns: u64) -> LevelcamResult<()>;

    /// Flush and close. Returns the number of frames written.
    fn finish(&mut self) -> LevelcamResult<u64>;

    /// Sink name for logging.
    fn name(&self) -> &str;
}

/// Writes frames as `frame_000000.png`, `frame_000001.png`, ...
pub struct PngSequenceSink {
    dir: PathBuf,
    written: u64,
    finished: bool,
}

impl PngSequenceSink {
    /// Create the output directory if needed.
    pub fn create(dir: impl AsRef<Path>) -> LevelcamResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        tracing::info!(dir = %dir.display(), "Writing PNG sequence");
        Ok(Self {
            dir,
            written: 0,
            finished: false,
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSink for PngSequenceSink {
    fn write_frame(&mut self, image: &RgbaImage, timestamp_ns: u64) -> LevelcamResult<()> {
        if self.finished {
            return Err(LevelcamError::render("PNG sequence already finished"));
        }
        let path = self.frame_path(self.written);
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| LevelcamError::render(format!("Failed to write {}: {e}", path.display())))?;
        tracing::trace!(path = %path.display(), timestamp_ns, "Frame written");
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> LevelcamResult<u64> {
        if !self.finished {
            self.finished = true;
            tracing::info!(frames = self.written, dir = %self.dir.display(), "PNG sequence complete");
        }
        Ok(self.written)
    }

    fn name(&self) -> &str {
        "png-sequence"
    }
}

/// Keeps frames in memory; used by tests and previews.
#[derive(Default)]
pub struct MemorySink {
    pub frames: Vec<(u64, RgbaImage)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, image: &RgbaImage, timestamp_ns: u64) -> LevelcamResult<()> {
        self.frames.push((timestamp_ns, image.clone()));
        Ok(())
    }

    fn finish(&mut self) -> LevelcamResult<u64> {
        Ok(self.frames.len() as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
