//! Configuration parsing and management for facesprite

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, FacespriteError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub avatar: AvatarConfig,
    pub tuning: TrackingTuning,
    pub hotkeys: HotkeyConfig,
    pub http: HttpConfig,
    pub mediapipe: MediaPipeConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FacespriteError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, FacespriteError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, FacespriteError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FacespriteError> {
        let positive = [
            ("tuning.blink_threshold", self.tuning.blink_threshold),
            ("tuning.mouth_threshold", self.tuning.mouth_threshold),
            ("tuning.angle_gain", self.tuning.angle_gain),
            ("tuning.translation_gain", self.tuning.translation_gain),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(field, "Must be a finite value greater than 0"));
            }
        }

        let keys = [
            ("hotkeys.laugh", &self.hotkeys.laugh),
            ("hotkeys.cry", &self.hotkeys.cry),
            ("hotkeys.clear", &self.hotkeys.clear),
            ("hotkeys.debug", &self.hotkeys.debug),
        ];
        let mut seen: Vec<char> = Vec::with_capacity(keys.len());
        for (field, key) in keys {
            let mut chars = key.chars();
            let c = match (chars.next(), chars.next()) {
                (Some(c), None) => c.to_ascii_lowercase(),
                _ => return Err(invalid(field, "Hotkey must be a single character")),
            };
            if seen.contains(&c) {
                return Err(invalid(field, "Hotkey is already bound"));
            }
            seen.push(c);
        }

        if self.http.port == 0 {
            return Err(invalid("http.port", "Port must be greater than 0"));
        }

        if self.mediapipe.port == 0 {
            return Err(invalid("mediapipe.port", "Port must be greater than 0"));
        }

        if self.mediapipe.control_port == 0 || self.mediapipe.control_port == self.mediapipe.port {
            return Err(invalid(
                "mediapipe.control_port",
                "Port must be greater than 0 and differ from mediapipe.port",
            ));
        }

        // One refined face is ~40 KB of JSON; two no longer fit a datagram
        if self.mediapipe.max_num_faces != 1 {
            return Err(invalid(
                "mediapipe.max_num_faces",
                "Only one face drives the avatar; must be 1",
            ));
        }

        if !(0.0..=1.0).contains(&self.mediapipe.min_detection_confidence)
            || !(0.0..=1.0).contains(&self.mediapipe.min_tracking_confidence)
        {
            return Err(invalid(
                "mediapipe.min_*_confidence",
                "Confidence must be between 0.0 and 1.0",
            ));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(invalid(
                "pipeline.queue_capacity",
                "Queue capacity must be greater than 0",
            ));
        }

        if self.mediapipe.auto_launch {
            let path = Path::new(&self.mediapipe.tracker_script);
            if !path.exists() {
                tracing::warn!(
                    "MediaPipe auto_launch enabled but tracker script not found at: {}",
                    self.mediapipe.tracker_script
                );
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> FacespriteError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Avatar sprite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Directory containing the sprite images
    pub assets_dir: PathBuf,
    /// Sprite file per expression (relative to assets_dir)
    pub sprites: SpriteConfig,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("./assets"),
            sprites: SpriteConfig::default(),
        }
    }
}

/// Sprite identifiers for each expression. An empty entry falls back to `base`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteConfig {
    pub base: String,
    pub blink: String,
    pub talk: String,
    pub laugh: String,
    pub cry: String,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            base: "base.png".to_string(),
            blink: "blink.png".to_string(),
            talk: "talk.png".to_string(),
            laugh: "laugh.png".to_string(),
            cry: "cry.png".to_string(),
        }
    }
}

/// Detection thresholds and pose gains.
///
/// The defaults are empirical values tuned for a 640x480 webcam feed and the
/// Face Mesh normalized coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingTuning {
    /// Eyelid gap below which an eye counts as closed
    pub blink_threshold: f64,
    /// Lip gap above which the mouth counts as open
    pub mouth_threshold: f64,
    /// Gain applied to the yaw and pitch proxies
    pub angle_gain: f64,
    /// Gain from pose proxy to screen pixels
    pub translation_gain: f64,
}

impl Default for TrackingTuning {
    fn default() -> Self {
        Self {
            blink_threshold: 0.012,
            mouth_threshold: 0.05,
            angle_gain: 3.0,
            translation_gain: 1000.0,
        }
    }
}

/// Single-character hotkeys for manual expression control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub laugh: String,
    pub cry: String,
    /// Clear the override and return to automatic detection
    pub clear: String,
    /// Toggle the debug panel
    pub debug: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            laugh: "l".to_string(),
            cry: "c".to_string(),
            clear: "n".to_string(),
            debug: "d".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Enable HTTP server
    pub enabled: bool,
    /// HTTP server host
    pub host: String,
    /// HTTP server port
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_enabled: true,
        }
    }
}

/// MediaPipe Face Mesh tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaPipeConfig {
    /// Enable landmark tracking
    pub enabled: bool,
    /// UDP port to receive landmark packets on
    pub port: u16,
    /// Listen address for UDP socket
    pub listen_address: String,
    /// UDP port the tracker listens on for preview toggles
    pub control_port: u16,
    /// Auto-launch the Python tracker subprocess
    pub auto_launch: bool,
    /// Path to the tracker script
    pub tracker_script: String,
    /// Camera device index
    pub camera_device: u32,
    /// Camera capture width
    pub capture_width: u32,
    /// Camera capture height
    pub capture_height: u32,
    /// Camera capture FPS
    pub capture_fps: u32,
    /// Faces the tracker should look for (only the first one is used)
    pub max_num_faces: u32,
    /// Enable iris refinement (478 points instead of 468)
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    /// Auto-restart subprocess on crash
    pub auto_restart: bool,
    /// Delay before restarting crashed subprocess (seconds)
    pub restart_delay_secs: u64,
}

impl Default for MediaPipeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 12346,
            listen_address: "127.0.0.1".to_string(),
            control_port: 12347,
            auto_launch: false,
            tracker_script: "scripts/face_mesh_tracker.py".to_string(),
            camera_device: 0,
            capture_width: 640,
            capture_height: 480,
            capture_fps: 30,
            max_num_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            auto_restart: true,
            restart_delay_secs: 3,
        }
    }
}

/// Frame pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the inbound event queue
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { queue_capacity: 8 }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("facesprite");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/facesprite");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/facesprite");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("facesprite");
        }
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tuning.blink_threshold, 0.012);
        assert_eq!(config.tuning.mouth_threshold, 0.05);
        assert_eq!(config.tuning.angle_gain, 3.0);
        assert_eq!(config.tuning.translation_gain, 1000.0);
        assert_eq!(config.avatar.sprites.base, "base.png");
        assert_eq!(config.hotkeys.laugh, "l");
        assert!(config.http.enabled);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [tuning]
            mouth_threshold = 0.08

            [avatar.sprites]
            cry = "sad.png"

            [hotkeys]
            laugh = "h"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.tuning.mouth_threshold, 0.08);
        assert_eq!(config.tuning.blink_threshold, 0.012);
        assert_eq!(config.avatar.sprites.cry, "sad.png");
        assert_eq!(config.avatar.sprites.talk, "talk.png");
        assert_eq!(config.hotkeys.laugh, "h");
        assert_eq!(config.hotkeys.cry, "c");
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let mut config = Config::default();
        config.tuning.blink_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tuning.translation_gain = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_hotkey() {
        let mut config = Config::default();
        config.hotkeys.cry = "L".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hotkeys.clear = "nn".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_multiple_faces() {
        let mut config = Config::default();
        config.mediapipe.max_num_faces = 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mediapipe.max_num_faces"));

        config.mediapipe.max_num_faces = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_shared_control_port() {
        let mut config = Config::default();
        config.mediapipe.control_port = config.mediapipe.port;
        assert!(config.validate().is_err());
    }
}
