//! Frame sources feeding a stabilization session.

use image::{Rgba, RgbaImage};
use levelcam_common::error::{LevelcamError, LevelcamResult};

/// A captured camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,

    /// Capture time on the session clock (ns).
    pub captured_at_ns: u64,
}

impl Frame {
    pub fn new(image: RgbaImage, captured_at_ns: u64) -> Self {
        Self {
            image,
            captured_at_ns,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Trait for camera capture backends.
pub trait FrameSource: Send {
    /// Pull the next frame. Returns `None` once the stream has ended.
    fn next_frame(&mut self) -> LevelcamResult<Option<Frame>>;

    /// Source name for logging.
    fn name(&self) -> &str;

    /// Pixel size of the frames this source produces.
    fn frame_size(&self) -> (u32, u32);
}

pub const SKY: Rgba<u8> = Rgba([110, 170, 235, 255]);
pub const GROUND: Rgba<u8> = Rgba([70, 110, 50, 255]);

/// Renders a sky/ground test card as seen by a rolled camera.
///
/// The horizon passes through the frame centre and appears rotated against
/// the device roll, the way a real scene does. A crop computed from the same
/// roll therefore shows a level horizon.
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    interval_ns: u64,
    roll: f64,
    sweep: Option<(f64, f64)>,
    limit: Option<u64>,
    index: u64,
}

impl SyntheticFrameSource {
    pub fn new(width: u32, height: u32, fps: u32) -> LevelcamResult<Self> {
        if width == 0 || height == 0 {
            return Err(LevelcamError::capture(format!(
                "Invalid synthetic frame size {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            interval_ns: 1_000_000_000 / fps.max(1) as u64,
            roll: 0.0,
            sweep: None,
            limit: None,
            index: 0,
        })
    }

    /// Hold the camera at a fixed roll.
    pub fn with_roll(mut self, roll: f64) -> Self {
        self.roll = roll;
        self
    }

    /// Sweep roll as `amplitude * sin(2π t / period)` on top of the fixed roll.
    pub fn with_sweep(mut self, amplitude: f64, period_secs: f64) -> Self {
        self.sweep = Some((amplitude, period_secs.max(1e-3)));
        self
    }

    /// End the stream after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Camera roll at a frame index.
    pub fn roll_at(&self, index: u64) -> f64 {
        let t_secs = (index * self.interval_ns) as f64 / 1_000_000_000.0;
        match self.sweep {
            Some((amplitude, period)) => {
                self.roll + amplitude * (std::f64::consts::TAU * t_secs / period).sin()
            }
            None => self.roll,
        }
    }

    /// Render the test card for a given camera roll.
    pub fn render(&self, roll: f64) -> RgbaImage {
        let (sin, cos) = roll.sin_cos();
        let cx = self.width as f64 / 2.0;
        let cy = self.height as f64 / 2.0;
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            // Height above the horizon in the world frame.
            if dx * sin + dy * cos < 0.0 {
                SKY
            } else {
                GROUND
            }
        })
    }
}

impl FrameSource for SyntheticFrameSource {
    fn next_frame(&mut self) -> LevelcamResult<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.index >= limit) {
            return Ok(None);
        }
        let image = self.render(self.roll_at(self.index));
        let frame = Frame::new(image, self.index * self.interval_ns);
        self.index += 1;
        Ok(Some(frame))
    }

    fn name(&self) -> &str {
        "synthetic"
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_card_splits_at_centre_row() {
        let source = SyntheticFrameSource::new(40, 30, 30).unwrap();
        let card = source.render(0.0);
        assert_eq!(*card.get_pixel(0, 0), SKY);
        assert_eq!(*card.get_pixel(39, 14), SKY);
        assert_eq!(*card.get_pixel(0, 15), GROUND);
        assert_eq!(*card.get_pixel(39, 29), GROUND);
    }

    #[test]
    fn test_rolled_card_tilts_horizon() {
        let source = SyntheticFrameSource::new(200, 200, 30).unwrap();
        // Rolling clockwise lifts the horizon on the right of the image.
        let card = source.render(0.3);
        assert_eq!(*card.get_pixel(190, 80), GROUND);
        assert_eq!(*card.get_pixel(10, 120), SKY);
    }

    #[test]
    fn test_limited_source_ends() {
        let mut source = SyntheticFrameSource::new(8, 8, 30).unwrap().with_limit(2);
        assert_eq!(source.next_frame().unwrap().unwrap().captured_at_ns, 0);
        assert_eq!(
            source.next_frame().unwrap().unwrap().captured_at_ns,
            33_333_333
        );
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_sweep_adds_to_fixed_roll() {
        let source = SyntheticFrameSource::new(8, 8, 40)
            .unwrap()
            .with_roll(0.1)
            .with_sweep(0.2, 1.0);
        assert!((source.roll_at(0) - 0.1).abs() < 1e-12);
        // A quarter period in.
        assert!((source.roll_at(10) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(SyntheticFrameSource::new(0, 10, 30).is_err());
    }
}
