//! Error types for facesprite

use thiserror::Error;

use crate::tracking::landmarks::FaceLandmark;

/// Main error type for facesprite
#[derive(Error, Debug)]
pub enum FacespriteError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Web server error: {0}")]
    Web(#[from] WebError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-frame errors. Never fatal: the pipeline skips the frame and keeps
/// the previous pose and expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Missing landmark {landmark:?} (index {index})")]
    MissingLandmark { landmark: FaceLandmark, index: usize },

    #[error("No face in frame")]
    MalformedFrame,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Avatar asset errors
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(String),
}

/// Landmark tracker errors (receiver + subprocess)
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Tracker receiver error: {0}")]
    Receiver(String),

    #[error("Tracker packet parse error: {0}")]
    Parse(String),

    #[error("Tracker subprocess error: {0}")]
    Subprocess(String),
}

/// Web server errors
#[derive(Error, Debug)]
pub enum WebError {
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    #[error("Server startup failed: {0}")]
    Startup(String),
}

/// Result type alias for facesprite operations
pub type Result<T> = std::result::Result<T, FacespriteError>;
