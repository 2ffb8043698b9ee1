//! Horizon-locked crop geometry.
//!
//! [`compute_crop_rect`] is the single source of the crop window. The preview
//! compositor and the frame persister both resolve its result with
//! [`CropRect::place`], so what is shown is what gets recorded.
//!
//! Display convention: origin top-left, x right, y down. A positive rotation
//! turns content clockwise on screen.

use levelcam_common::config::{CropSettings, StabilizationMode};
use serde::{Deserialize, Serialize};

use crate::signal::MotionSignal;

/// Crop width units of the 3:4:5 triangle.
pub const CROP_ASPECT_WIDTH: f64 = 3.0;
/// Crop height units of the 3:4:5 triangle.
pub const CROP_ASPECT_HEIGHT: f64 = 4.0;
/// Crop diagonal units of the 3:4:5 triangle.
pub const CROP_ASPECT_DIAGONAL: f64 = 5.0;

/// Width of the crop relative to its diagonal.
pub const BASE_FRACTION: f64 = CROP_ASPECT_WIDTH / CROP_ASPECT_DIAGONAL;

/// Width / height of every crop.
pub const CROP_ASPECT_RATIO: f64 = CROP_ASPECT_WIDTH / CROP_ASPECT_HEIGHT;

/// A 2D point or displacement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Rotate about the origin by `theta` radians (clockwise on a y-down screen).
    pub fn rotated(&self, theta: f64) -> Point2D {
        let (sin, cos) = theta.sin_cos();
        Point2D {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }
}

/// Width and height of a container or image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Positive, finite width and height.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn shorter_side(&self) -> f64 {
        self.width.min(self.height)
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(self.width / 2.0, self.height / 2.0)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f64, height as f64)
    }
}

/// The level crop window, relative to the container it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    /// Crop width / container width.
    pub width_fraction: f64,

    /// Crop height / container height.
    pub height_fraction: f64,

    /// Rotation applied to the content, the negated device roll (radians).
    pub rotation: f64,

    /// Displacement of the crop centre from the container centre, as a
    /// fraction of the container size. Display convention (down is +y).
    pub center_offset: Point2D,

    /// The container the fractions refer to.
    pub container: Size,
}

/// A crop resolved in a concrete pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacedCrop {
    pub center: Point2D,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

/// Compute the crop window for a container and the latest signal.
///
/// `offset` is the normalized translation in the sensor convention (up is
/// +y); pass `None` for roll-only stabilization. Returns `None` when the
/// container or signal is degenerate so the caller skips the frame.
pub fn compute_crop_rect(
    container_width: f64,
    container_height: f64,
    roll: f64,
    offset: Option<(f64, f64)>,
    settings: &CropSettings,
) -> Option<CropRect> {
    let container = Size::new(container_width, container_height);
    if !container.is_valid() || !roll.is_finite() {
        return None;
    }
    if !(settings.inset_factor > 0.0 && settings.inset_factor <= 1.0) {
        return None;
    }

    let width = container.shorter_side() * BASE_FRACTION * settings.inset_factor;
    let height = width * CROP_ASPECT_HEIGHT / CROP_ASPECT_WIDTH;
    if !width.is_normal() || !height.is_normal() {
        return None;
    }

    let mut shift = Point2D::default();
    if let Some((offset_x, offset_y)) = offset {
        if !offset_x.is_finite() || !offset_y.is_finite() {
            return None;
        }
        let damping = settings.damping_factor.clamp(0.0, 1.0);
        let margin_x = (container.width - width) / 2.0;
        let margin_y = (container.height - height) / 2.0;
        shift.x = offset_x.clamp(-1.0, 1.0) * margin_x * damping;
        // Sensor up is display down.
        shift.y = -offset_y.clamp(-1.0, 1.0) * margin_y * damping;
    }

    Some(CropRect {
        width_fraction: width / container.width,
        height_fraction: height / container.height,
        rotation: -roll,
        center_offset: Point2D::new(shift.x / container.width, shift.y / container.height),
        container,
    })
}

/// Compute the crop for a published signal under the given mode.
///
/// Both the preview and the persistence path go through here.
pub fn crop_for_signal(
    container: Size,
    signal: &MotionSignal,
    mode: StabilizationMode,
    settings: &CropSettings,
) -> Option<CropRect> {
    let offset = mode
        .uses_translation()
        .then(|| signal.translation.offset());
    compute_crop_rect(
        container.width,
        container.height,
        signal.roll(),
        offset,
        settings,
    )
}

impl CropRect {
    /// Crop width in container units.
    pub fn width(&self) -> f64 {
        self.width_fraction * self.container.width
    }

    /// Crop height in container units.
    pub fn height(&self) -> f64 {
        self.height_fraction * self.container.height
    }

    /// Width / height; always 3:4.
    pub fn aspect_ratio(&self) -> f64 {
        self.width() / self.height()
    }

    /// Resolve the crop in a target space.
    ///
    /// The container is fitted into the target with a uniform scale and
    /// centred, so targets with the container's aspect ratio (a scaled
    /// preview, a full-resolution frame) map exactly. Returns `None` for a
    /// degenerate target.
    pub fn place(&self, target_width: f64, target_height: f64) -> Option<PlacedCrop> {
        let target = Size::new(target_width, target_height);
        if !target.is_valid() {
            return None;
        }
        let scale = (target.width / self.container.width).min(target.height / self.container.height);
        let center = target.center();
        Some(PlacedCrop {
            center: Point2D::new(
                center.x + self.center_offset.x * self.container.width * scale,
                center.y + self.center_offset.y * self.container.height * scale,
            ),
            width: self.width() * scale,
            height: self.height() * scale,
            rotation: self.rotation,
        })
    }

    /// Resolve the crop in the container it was computed for.
    pub fn place_in_container(&self) -> PlacedCrop {
        let center = self.container.center();
        PlacedCrop {
            center: Point2D::new(
                center.x + self.center_offset.x * self.container.width,
                center.y + self.center_offset.y * self.container.height,
            ),
            width: self.width(),
            height: self.height(),
            rotation: self.rotation,
        }
    }
}

impl PlacedCrop {
    pub fn diagonal(&self) -> f64 {
        (self.width.powi(2) + self.height.powi(2)).sqrt()
    }

    /// Corners in clockwise order starting top-left, after rotation.
    pub fn corners(&self) -> [Point2D; 4] {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [
            Point2D::new(-hw, -hh),
            Point2D::new(hw, -hh),
            Point2D::new(hw, hh),
            Point2D::new(-hw, hh),
        ]
        .map(|corner| {
            let r = corner.rotated(self.rotation);
            Point2D::new(self.center.x + r.x, self.center.y + r.y)
        })
    }

    /// Axis-aligned bounds of the rotated corners as `(min, max)`.
    pub fn bounds(&self) -> (Point2D, Point2D) {
        let corners = self.corners();
        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        (min, max)
    }

    /// Whether this crop matches another within `tolerance` (centre, size, rotation).
    pub fn congruent_with(&self, other: &PlacedCrop, tolerance: f64) -> bool {
        self.center.distance_to(&other.center) <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
            && (self.rotation - other.rotation).abs() <= tolerance
    }
}
