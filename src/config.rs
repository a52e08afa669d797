//! Overlay settings
//!
//! Every field has a serde default, so a partial or missing config file yields
//! the stock 120x46 panel in the bottom-right corner.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// RGBA color as [r, g, b, a]
pub type Color = [u8; 4];

const APP_NAME: &str = "netspeed-overlay";
const CONFIG_NAME: &str = "config";

fn default_width() -> u32 {
    120
}
fn default_height() -> u32 {
    46
}
fn default_right_margin() -> u32 {
    260
}
fn default_corner_radius() -> f32 {
    23.0
}
fn default_background() -> Color {
    [33, 33, 33, 1]
}
fn default_text_color() -> Color {
    [97, 97, 97, 255]
}
fn default_font_family() -> String {
    "Inter".to_string()
}
fn default_font_size() -> f32 {
    11.0
}
fn default_padding_left() -> u32 {
    24
}
fn default_padding_top() -> u32 {
    10
}
fn default_line_spacing() -> u32 {
    3
}
fn default_sample_interval_ms() -> u64 {
    1000
}
fn default_topmost_interval_ms() -> u64 {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Gap between the panel and the right edge of the primary screen
    #[serde(default = "default_right_margin")]
    pub right_margin: u32,
    #[serde(default)]
    pub bottom_margin: u32,
    #[serde(default = "default_corner_radius")]
    pub corner_radius: f32,
    #[serde(default = "default_background")]
    pub background: Color,
    #[serde(default = "default_text_color")]
    pub text_color: Color,
    /// Falls back to the system sans-serif when not installed
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Pixels
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_padding_left")]
    pub padding_left: u32,
    #[serde(default = "default_padding_top")]
    pub padding_top: u32,
    #[serde(default = "default_line_spacing")]
    pub line_spacing: u32,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_topmost_interval_ms")]
    pub topmost_interval_ms: u64,
    #[serde(default)]
    pub click_through: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            right_margin: default_right_margin(),
            bottom_margin: 0,
            corner_radius: default_corner_radius(),
            background: default_background(),
            text_color: default_text_color(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            padding_left: default_padding_left(),
            padding_top: default_padding_top(),
            line_spacing: default_line_spacing(),
            sample_interval_ms: default_sample_interval_ms(),
            topmost_interval_ms: default_topmost_interval_ms(),
            click_through: false,
        }
    }
}

impl OverlaySettings {
    /// Read the user's config file, creating it with defaults on first run.
    /// An unreadable file is logged and replaced by the defaults in memory.
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn try_load() -> Result<Self, ConfigError> {
        if let Ok(path) = confy::get_configuration_file_path(APP_NAME, CONFIG_NAME) {
            debug!(path = %path.display(), "Loading config");
        }
        Ok(confy::load(APP_NAME, CONFIG_NAME)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid {
                field: "width/height",
                reason: format!("window must be non-empty, got {}x{}", self.width, self.height),
            });
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "font_size",
                reason: format!("must be a positive number, got {}", self.font_size),
            });
        }
        if !(self.corner_radius.is_finite() && self.corner_radius >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "corner_radius",
                reason: format!("must be zero or positive, got {}", self.corner_radius),
            });
        }
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sample_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.topmost_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "topmost_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.topmost_interval_ms >= self.sample_interval_ms {
            warn!(
                topmost_ms = self.topmost_interval_ms,
                sample_ms = self.sample_interval_ms,
                "Topmost interval is not shorter than the sample interval; other windows may cover the overlay between raises"
            );
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn topmost_interval(&self) -> Duration {
        Duration::from_millis(self.topmost_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_panel() {
        let settings = OverlaySettings::default();
        assert_eq!((settings.width, settings.height), (120, 46));
        assert_eq!(settings.right_margin, 260);
        assert_eq!(settings.bottom_margin, 0);
        assert_eq!(settings.corner_radius, 23.0);
        assert_eq!(settings.sample_interval(), Duration::from_secs(1));
        assert_eq!(settings.topmost_interval(), Duration::from_millis(50));
        assert!(!settings.click_through);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings: OverlaySettings = toml::from_str("").unwrap();
        assert_eq!(settings, OverlaySettings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings: OverlaySettings = toml::from_str(
            r#"
            right_margin = 40
            text_color = [255, 255, 255, 200]
            "#,
        )
        .unwrap();
        assert_eq!(settings.right_margin, 40);
        assert_eq!(settings.text_color, [255, 255, 255, 200]);
        assert_eq!(settings.width, 120);
        assert_eq!(settings.font_family, "Inter");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let settings = OverlaySettings {
            sample_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid {
                field: "sample_interval_ms",
                ..
            })
        ));

        let settings = OverlaySettings {
            topmost_interval_ms: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_empty_window_rejected() {
        let settings = OverlaySettings {
            height: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_slow_topmost_is_only_a_warning() {
        let settings = OverlaySettings {
            topmost_interval_ms: 2000,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }
}
