//! Configuration types for encoding and playback.

use serde::{Deserialize, Serialize};

use crate::container::CompressionType;

/// Default glyph ramp, darkest to lightest.
pub const DEFAULT_RAMP: &str = " .:-=+*#%@";

/// Default shading gamma.
pub const DEFAULT_GAMMA: f32 = 2.2;

/// Default container frame rate.
pub const DEFAULT_FPS: u8 = 10;

fn default_ramp() -> String {
    DEFAULT_RAMP.to_string()
}

fn default_gamma() -> f32 {
    DEFAULT_GAMMA
}

fn default_fps() -> u8 {
    DEFAULT_FPS
}

/// Glyph quantization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterConfig {
    /// Glyphs ordered from darkest to lightest.
    #[serde(default = "default_ramp")]
    pub ramp: String,
    /// Shading gamma; luminance is raised to `1 / gamma`.
    #[serde(default = "default_gamma")]
    pub gamma: f32,
    /// Map bright pixels to dark glyphs.
    #[serde(default)]
    pub invert: bool,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            ramp: default_ramp(),
            gamma: DEFAULT_GAMMA,
            invert: false,
        }
    }
}

impl RasterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ramp.is_empty() {
            return Err(ConfigError::EmptyRamp);
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(ConfigError::InvalidGamma(self.gamma));
        }
        Ok(())
    }
}

/// Player session settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Show frame counter, measured fps and frame delta.
    #[serde(default)]
    pub debug: bool,
    /// Step one frame per key press instead of following the clock.
    #[serde(default)]
    pub frame_advance: bool,
    /// Show the title screen and wait for a key before starting.
    #[serde(default)]
    pub wait_for_input: bool,
    /// Title shown on the start screen.
    #[serde(default)]
    pub title: Option<String>,
    /// Rasterization settings.
    #[serde(default)]
    pub raster: RasterConfig,
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.raster.validate()
    }
}

/// Container encoding settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// Playback rate baked into the container.
    #[serde(default = "default_fps")]
    pub fps: u8,
    /// Output raster size; `None` keeps the source size.
    #[serde(default)]
    pub size: Option<(u32, u32)>,
    /// Chunk compression.
    #[serde(default)]
    pub compression: CompressionType,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            size: None,
            compression: CompressionType::Lz4,
        }
    }
}

impl EncodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::InvalidFps);
        }
        if let Some((w, h)) = self.size {
            if w == 0 || h == 0 {
                return Err(ConfigError::InvalidSize(format!("{}x{}", w, h)));
            }
        }
        Ok(())
    }
}

/// Parse a frame size written as `WxH` or `W,H` (whitespace ignored).
pub fn parse_size(value: &str) -> Result<(u32, u32), ConfigError> {
    let compact: String = value.split_whitespace().collect();
    let (w, h) = compact
        .split_once(['x', 'X', ','])
        .ok_or_else(|| ConfigError::InvalidSize(value.to_string()))?;

    let width: u32 = w
        .parse()
        .map_err(|_| ConfigError::InvalidSize(value.to_string()))?;
    let height: u32 = h
        .parse()
        .map_err(|_| ConfigError::InvalidSize(value.to_string()))?;

    if width == 0 || height == 0 {
        return Err(ConfigError::InvalidSize(value.to_string()));
    }
    Ok((width, height))
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Glyph ramp must contain at least one character")]
    EmptyRamp,
    #[error("Gamma must be a positive number (got {0})")]
    InvalidGamma(f32),
    #[error("Frame rate must be between 1 and 255")]
    InvalidFps,
    #[error("Invalid size {0:?}; expected WxH with non-zero integers")]
    InvalidSize(String),
    #[error("Invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_forms() {
        assert_eq!(parse_size("80x60").unwrap(), (80, 60));
        assert_eq!(parse_size("80, 60").unwrap(), (80, 60));
        assert_eq!(parse_size(" 4 X 3 ").unwrap(), (4, 3));
        assert!(parse_size("80").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn test_raster_config_validation() {
        assert!(RasterConfig::default().validate().is_ok());

        let empty = RasterConfig {
            ramp: String::new(),
            ..Default::default()
        };
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyRamp)));

        let bad_gamma = RasterConfig {
            gamma: 0.0,
            ..Default::default()
        };
        assert!(matches!(bad_gamma.validate(), Err(ConfigError::InvalidGamma(_))));
    }

    #[test]
    fn test_playback_config_from_partial_json() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{ "debug": true, "raster": { "invert": true } }"#).unwrap();
        assert!(config.debug);
        assert!(config.raster.invert);
        assert_eq!(config.raster.ramp, DEFAULT_RAMP);
        assert_eq!(config.raster.gamma, DEFAULT_GAMMA);
    }

    #[test]
    fn test_encode_config_defaults() {
        let config = EncodeConfig::default();
        assert_eq!(config.fps, 10);
        assert_eq!(config.compression, CompressionType::Lz4);
        assert!(config.validate().is_ok());

        let zero = EncodeConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(ConfigError::InvalidFps)));
    }
}
