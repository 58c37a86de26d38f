//! Configuration management for Stratum
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. It covers the display geometry the coordinator
//! assumes until told otherwise, animation gating, and the wallpaper
//! dispatch timeouts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration struct containing all Stratum settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StratumConfig {
    /// Display geometry
    #[serde(default)]
    pub display: DisplayConfig,

    /// Animation gating
    #[serde(default)]
    pub animations: AnimationsConfig,

    /// Wallpaper dispatch timing
    #[serde(default)]
    pub wallpaper: WallpaperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    /// Initial display width (pixels)
    pub width: i32,

    /// Initial display height (pixels)
    pub height: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimationsConfig {
    /// Enable window and transition animations. When disabled, hides
    /// and removes take effect immediately instead of deferring behind
    /// an exit animation.
    pub enabled: bool,

    /// Window animation scale factor (0 disables window animations)
    pub window_scale: f32,

    /// Application transition animation scale factor
    pub transition_scale: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WallpaperConfig {
    /// How long a synchronous offset dispatch may block waiting for the
    /// wallpaper client to acknowledge (milliseconds)
    #[serde(default = "WallpaperConfig::default_offset_timeout_ms")]
    pub offset_timeout_ms: u64,

    /// After a timed-out acknowledgement, how long to keep dispatching
    /// without blocking before trusting the client again (milliseconds)
    #[serde(default = "WallpaperConfig::default_timeout_recovery_ms")]
    pub timeout_recovery_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
        }
    }
}

impl Default for AnimationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_scale: 1.0,
            transition_scale: 1.0,
        }
    }
}

impl Default for WallpaperConfig {
    fn default() -> Self {
        Self {
            offset_timeout_ms: Self::default_offset_timeout_ms(),
            timeout_recovery_ms: Self::default_timeout_recovery_ms(),
        }
    }
}

impl WallpaperConfig {
    fn default_offset_timeout_ms() -> u64 {
        150
    }

    fn default_timeout_recovery_ms() -> u64 {
        10_000
    }
}

impl StratumConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: StratumConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.display.width <= 0 || self.display.height <= 0 {
            anyhow::bail!(
                "Invalid display size: {}x{}",
                self.display.width,
                self.display.height
            );
        }

        if self.animations.window_scale < 0.0 || self.animations.transition_scale < 0.0 {
            anyhow::bail!("Animation scales must be non-negative");
        }

        if self.wallpaper.offset_timeout_ms == 0 {
            anyhow::bail!("wallpaper.offset_timeout_ms must be at least 1");
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StratumConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.wallpaper.offset_timeout_ms, 150);
        assert_eq!(config.wallpaper.timeout_recovery_ms, 10_000);
        assert!(config.animations.enabled);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: StratumConfig = toml::from_str(
            r#"
            [display]
            width = 800
            height = 600
            "#,
        )
        .unwrap();
        assert_eq!(config.display.width, 800);
        assert_eq!(config.wallpaper.offset_timeout_ms, 150);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stratum.toml");

        let mut config = StratumConfig::default();
        config.display.width = 2560;
        config.wallpaper.offset_timeout_ms = 75;
        config.save(&path).unwrap();

        let loaded = StratumConfig::load(&path).unwrap();
        assert_eq!(loaded.display.width, 2560);
        assert_eq!(loaded.wallpaper.offset_timeout_ms, 75);
    }

    #[test]
    fn test_invalid_display_rejected() {
        let config: StratumConfig = toml::from_str(
            r#"
            [display]
            width = 0
            height = 600
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
