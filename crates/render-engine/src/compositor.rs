//! Preview compositor: places the level crop window over the live feed.
//!
//! The preview never resamples pixels. It draws the feed untouched and
//! clips it to a rotated rectangle, so the horizon stays level inside the
//! window while the device tilts around it.

use levelcam_common::config::{CropSettings, StabilizationMode};
use levelcam_crop_model::crop::{crop_for_signal, CropRect, PlacedCrop, Point2D, Size};
use levelcam_crop_model::signal::MotionSignal;

/// A 2D affine transform, `x' = a·x + c·y + tx`, `y' = b·x + d·y + ty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Map a crop-local point onto the target it was placed in.
    ///
    /// Crop-local space is the upright `width × height` window with its
    /// origin at the top-left corner. The preview uses this to position the
    /// clip layer and the persistence path uses it to pick source pixels,
    /// which is what keeps the two congruent.
    pub fn crop_to_target(crop: &PlacedCrop) -> Affine2 {
        let (sin, cos) = crop.rotation.sin_cos();
        let hw = crop.width / 2.0;
        let hh = crop.height / 2.0;
        Affine2 {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: crop.center.x - (cos * hw - sin * hh),
            ty: crop.center.y - (sin * hw + cos * hh),
        }
    }

    pub fn apply(&self, p: Point2D) -> Point2D {
        Point2D::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// CSS `matrix()` notation for web-based previews.
    pub fn to_css_matrix(&self) -> String {
        format!(
            "matrix({:.6}, {:.6}, {:.6}, {:.6}, {:.3}, {:.3})",
            self.a, self.b, self.c, self.d, self.tx, self.ty
        )
    }
}

/// Everything the preview needs to draw one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    /// Size of the preview container in points.
    pub container: Size,

    /// The crop resolved in container space.
    pub crop: PlacedCrop,

    /// Places the upright crop layer onto the container.
    pub layer_transform: Affine2,

    /// Clip polygon in container space, clockwise from top-left.
    pub clip_polygon: [Point2D; 4],
}

impl DisplayTransform {
    /// Resolve a crop against a preview container.
    ///
    /// Returns `None` for a degenerate container; the caller keeps the
    /// previous transform.
    pub fn from_crop(crop: &CropRect, container: Size) -> Option<Self> {
        let placed = crop.place(container.width, container.height)?;
        Some(Self {
            container,
            crop: placed,
            layer_transform: Affine2::crop_to_target(&placed),
            clip_polygon: placed.corners(),
        })
    }

    /// Axis-aligned bounds of the clip polygon as `(min, max)`.
    pub fn clip_bounds(&self) -> (Point2D, Point2D) {
        self.crop.bounds()
    }

    /// Rotation of the window in degrees, for UI readouts.
    pub fn rotation_degrees(&self) -> f64 {
        self.crop.rotation.to_degrees()
    }
}

/// Compute the preview transform for the latest signal.
pub fn compose(
    container: Size,
    signal: &MotionSignal,
    mode: StabilizationMode,
    settings: &CropSettings,
) -> Option<DisplayTransform> {
    let crop = crop_for_signal(container, signal, mode, settings)?;
    DisplayTransform::from_crop(&crop, container)
}
