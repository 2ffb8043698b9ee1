//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LevelcamError, LevelcamResult};

/// Highest accepted motion sampling rate (Hz).
pub const MAX_SAMPLE_RATE_HZ: u32 = 1000;

/// Highest accepted capture frame rate.
pub const MAX_CAPTURE_FPS: u32 = 1000;

/// Global application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Which stabilization signal drives the crop.
    pub mode: StabilizationMode,

    /// Motion estimator parameters.
    pub motion: MotionSettings,

    /// Crop geometry parameters.
    pub crop: CropSettings,

    /// Frame capture and persistence parameters.
    pub capture: CaptureSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Stabilization variant.
///
/// Roll-only keeps the crop centred and levels it; roll-and-translation also
/// shifts the crop against short device jerks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilizationMode {
    #[default]
    RollOnly,
    RollAndTranslation,
}

impl StabilizationMode {
    /// Whether the translational offset participates in the crop.
    pub fn uses_translation(self) -> bool {
        matches!(self, Self::RollAndTranslation)
    }
}

impl std::str::FromStr for StabilizationMode {
    type Err = LevelcamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "roll" | "roll_only" | "roll-only" => Ok(Self::RollOnly),
            "translation" | "roll_and_translation" | "roll-and-translation" => {
                Ok(Self::RollAndTranslation)
            }
            other => Err(LevelcamError::config(format!(
                "Unknown stabilization mode: {other}"
            ))),
        }
    }
}

/// Motion estimator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Sensor sampling rate (Hz).
    pub sample_rate_hz: u32,

    /// Per-tick multiplicative velocity decay, in (0, 1).
    pub velocity_decay: f64,

    /// Per-tick multiplicative offset decay, in (0, 1).
    pub offset_decay: f64,

    /// Scale from integrated velocity to normalized offset.
    pub sensitivity: f64,
}

/// Crop geometry parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropSettings {
    /// Fraction of the shorter container side the crop diagonal may span, in (0, 1].
    pub inset_factor: f64,

    /// Fraction of the available margin used by translation, in [0, 1].
    pub damping_factor: f64,

    /// Growth of the pre-rotation sampling region over the larger crop side.
    pub sampling_expansion: f64,
}

/// Frame capture parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Frame rate of the capture loop.
    pub fps: u32,

    /// Directory that receives persisted frames.
    pub output_dir: PathBuf,

    /// Orientation older than this relative to a frame is logged as stale.
    pub max_signal_age_ms: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "levelcam=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: StabilizationMode::default(),
            motion: MotionSettings::default(),
            crop: CropSettings::default(),
            capture: CaptureSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: 120,
            velocity_decay: 0.9,
            offset_decay: 0.95,
            sensitivity: 2.0,
        }
    }
}

impl MotionSettings {
    /// Sampling interval in seconds.
    pub fn dt_secs(&self) -> f64 {
        1.0 / self.sample_rate_hz.max(1) as f64
    }
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            inset_factor: 0.9,
            damping_factor: 0.5,
            sampling_expansion: 1.5,
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            output_dir: PathBuf::from("frames"),
            max_signal_age_ms: 50.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::from_file(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> LevelcamResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LevelcamError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> LevelcamResult<PathBuf> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> LevelcamResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject parameter values the estimator or geometry cannot work with.
    pub fn validate(&self) -> LevelcamResult<()> {
        let motion = &self.motion;
        if !(1..=MAX_SAMPLE_RATE_HZ).contains(&motion.sample_rate_hz) {
            return Err(LevelcamError::config(format!(
                "Sample rate must be between 1 and {MAX_SAMPLE_RATE_HZ} Hz"
            )));
        }
        if !(motion.velocity_decay > 0.0 && motion.velocity_decay < 1.0) {
            return Err(LevelcamError::config(
                "Velocity decay must be between 0.0 and 1.0 (exclusive)",
            ));
        }
        if !(motion.offset_decay > 0.0 && motion.offset_decay < 1.0) {
            return Err(LevelcamError::config(
                "Offset decay must be between 0.0 and 1.0 (exclusive)",
            ));
        }
        if !(motion.sensitivity.is_finite() && motion.sensitivity >= 0.0) {
            return Err(LevelcamError::config(
                "Sensitivity must be a non-negative number",
            ));
        }

        let crop = &self.crop;
        if !(crop.inset_factor > 0.0 && crop.inset_factor <= 1.0) {
            return Err(LevelcamError::config(
                "Inset factor must be in (0.0, 1.0]",
            ));
        }
        if !(0.0..=1.0).contains(&crop.damping_factor) {
            return Err(LevelcamError::config(
                "Damping factor must be between 0.0 and 1.0",
            ));
        }
        if !(crop.sampling_expansion.is_finite() && crop.sampling_expansion >= std::f64::consts::SQRT_2)
        {
            return Err(LevelcamError::config(format!(
                "Sampling expansion must be at least {:.4} to cover a 45 degree rotation",
                std::f64::consts::SQRT_2
            )));
        }

        if !(1..=MAX_CAPTURE_FPS).contains(&self.capture.fps) {
            return Err(LevelcamError::config(format!(
                "Capture FPS must be between 1 and {MAX_CAPTURE_FPS}"
            )));
        }

        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("levelcam").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_non_leaky_decay() {
        let mut config = AppConfig::default();
        config.motion.velocity_decay = 1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.motion.offset_decay = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_small_sampling_expansion() {
        let mut config = AppConfig::default();
        config.crop.sampling_expansion = 1.2;
        assert!(config.validate().is_err());

        config.crop.sampling_expansion = std::f64::consts::SQRT_2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_rates() {
        let mut config = AppConfig::default();
        config.motion.sample_rate_hz = 3_000_000_000;
        assert!(config.validate().is_err());
        config.motion.sample_rate_hz = MAX_SAMPLE_RATE_HZ;
        assert!(config.validate().is_ok());

        config.capture.fps = 0;
        assert!(config.validate().is_err());
        config.capture.fps = MAX_CAPTURE_FPS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"mode":"roll_and_translation","crop":{"inset_factor":0.8}}"#)
                .unwrap();
        assert_eq!(config.mode, StabilizationMode::RollAndTranslation);
        assert!((config.crop.inset_factor - 0.8).abs() < 1e-12);
        assert!((config.crop.sampling_expansion - 1.5).abs() < 1e-12);
        assert_eq!(config.motion.sample_rate_hz, 120);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.mode = StabilizationMode::RollAndTranslation;
        config.capture.fps = 60;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = AppConfig::from_file("/nonexistent/levelcam.json").unwrap_err();
        assert!(matches!(err, LevelcamError::FileNotFound { .. }));
    }

    #[test]
    fn test_mode_parses_aliases() {
        assert_eq!(
            "roll".parse::<StabilizationMode>().unwrap(),
            StabilizationMode::RollOnly
        );
        assert_eq!(
            "roll-and-translation".parse::<StabilizationMode>().unwrap(),
            StabilizationMode::RollAndTranslation
        );
        assert!("pan".parse::<StabilizationMode>().is_err());
    }
}
