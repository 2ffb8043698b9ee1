//! Error types shared across LevelCam crates.

use std::path::PathBuf;

/// Top-level error type for LevelCam operations.
#[derive(Debug, thiserror::Error)]
pub enum LevelcamError {
    #[error("Motion error: {message}")]
    Motion { message: String },

    #[error("Geometry error: {message}")]
    Geometry { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using LevelcamError.
pub type LevelcamResult<T> = Result<T, LevelcamError>;

impl LevelcamError {
    pub fn motion(msg: impl Into<String>) -> Self {
        Self::Motion {
            message: msg.into(),
        }
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors_format_messages() {
        assert_eq!(
            LevelcamError::geometry("zero-size container").to_string(),
            "Geometry error: zero-size container"
        );
        assert_eq!(
            LevelcamError::config("bad decay").to_string(),
            "Configuration error: bad decay"
        );
    }

    #[test]
    fn test_io_errors_convert() {
        let err: LevelcamError = std::io::Error::other("disk full").into();
        assert!(matches!(err, LevelcamError::Io(_)));
    }
}
