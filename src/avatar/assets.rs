//! Sprite asset loading

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::expression::{ExpressionState, SpriteMapping};
use crate::config::AvatarConfig;
use crate::error::{AvatarError, FacespriteError};

/// Resolves sprite identifiers to files in the assets directory
#[derive(Debug)]
pub struct AssetManager {
    /// Base directory for assets
    base_dir: PathBuf,
    /// Expression to sprite identifier
    mapping: SpriteMapping,
    /// Sprites found on disk (identifier -> absolute path)
    assets: HashMap<String, PathBuf>,
}

impl AssetManager {
    /// Create a new asset manager from configuration
    pub fn new(config: &AvatarConfig) -> Self {
        let base_dir = if config.assets_dir.is_absolute() {
            config.assets_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&config.assets_dir)
        };

        let mut manager = Self {
            base_dir,
            mapping: SpriteMapping::from_config(&config.sprites),
            assets: HashMap::new(),
        };
        manager.scan_assets();
        manager
    }

    /// Look up every mapped sprite on disk. Missing files are logged, not fatal.
    fn scan_assets(&mut self) {
        if !self.base_dir.exists() {
            tracing::warn!(
                "Assets directory does not exist: {}",
                self.base_dir.display()
            );
            return;
        }

        for (state, sprite) in self.mapping.entries() {
            let path = self.base_dir.join(sprite);
            if path.exists() {
                tracing::debug!("Loaded sprite: {} -> {}", state, sprite);
                self.assets.insert(sprite.to_string(), path);
            } else {
                tracing::warn!("Sprite not found: {} ({})", state, path.display());
            }
        }
    }

    pub fn mapping(&self) -> &SpriteMapping {
        &self.mapping
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Check if the sprite for an expression is on disk
    pub fn has_sprite(&self, state: ExpressionState) -> bool {
        self.assets.contains_key(self.mapping.sprite(state))
    }

    /// Path of the sprite for an expression
    pub fn get_path(&self, state: ExpressionState) -> Option<&Path> {
        self.assets
            .get(self.mapping.sprite(state))
            .map(|p| p.as_path())
    }

    /// Read the sprite for an expression, falling back to the base sprite
    pub fn get_data(&self, state: ExpressionState) -> Result<(Vec<u8>, &'static str), FacespriteError> {
        let path = self
            .get_path(state)
            .or_else(|| self.get_path(ExpressionState::Base))
            .ok_or_else(|| AvatarError::AssetNotFound(self.mapping.sprite(state).to_string()))?;

        let data = std::fs::read(path).map_err(|e| {
            FacespriteError::from(AvatarError::ImageLoad(format!("{}: {}", path.display(), e)))
        })?;

        Ok((data, mime_type(path)))
    }
}

/// MIME type from the file extension
pub fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
