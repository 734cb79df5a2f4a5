//! Renderer configuration
//!
//! Every tunable constant of the normalization pipeline and the bridge lives
//! here so hosts can adjust them from a TOML file without touching code.

use crate::error::{MailframeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub bridge: BridgeSettings,
    pub layout: LayoutSettings,
    pub dark_mode: DarkModeSettings,
    pub oversize: OversizeSettings,
    pub hidden_content: HiddenContentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeSettings {
    /// Interval between delivery attempts while the content surface is not mounted
    pub mount_retry_interval_ms: u64,
    /// Trailing debounce for the load signal in dark mode
    pub load_debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutSettings {
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// Font size assumed for text without an explicit size, in px
    pub default_font_size: f32,
    /// Residual overflow tolerated after scaling before table text is shrunk further
    pub overflow_slack: f32,
    /// Container padding applied in preview mode when the body has no media
    pub preview_padding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DarkModeSettings {
    /// Perceived brightness above which a color counts as light, in [0, 1]
    pub luminance_threshold: f32,
    pub background: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OversizeSettings {
    /// Unbroken runs in link text longer than this get break opportunities
    pub long_url_threshold: usize,
    /// Maximum characters between inserted break opportunities
    pub long_url_chunk: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HiddenContentSettings {
    pub enabled: bool,
    pub strip_display_none: bool,
    pub strip_zero_size: bool,
    pub strip_offscreen: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeSettings::default(),
            layout: LayoutSettings::default(),
            dark_mode: DarkModeSettings::default(),
            oversize: OversizeSettings::default(),
            hidden_content: HiddenContentSettings::default(),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            mount_retry_interval_ms: 100,
            load_debounce_ms: 300,
        }
    }
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            viewport_width: 375.0,
            viewport_height: 667.0,
            default_font_size: 16.0,
            overflow_slack: 20.0,
            preview_padding: "2ex".to_string(),
        }
    }
}

impl Default for DarkModeSettings {
    fn default() -> Self {
        Self {
            luminance_threshold: 0.5,
            background: "#121212".to_string(),
            text: "#fff".to_string(),
        }
    }
}

impl Default for OversizeSettings {
    fn default() -> Self {
        Self {
            long_url_threshold: 30,
            long_url_chunk: 20,
        }
    }
}

impl Default for HiddenContentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strip_display_none: true,
            strip_zero_size: true,
            strip_offscreen: true,
        }
    }
}

impl BridgeSettings {
    pub fn mount_retry_interval(&self) -> Duration {
        Duration::from_millis(self.mount_retry_interval_ms)
    }

    pub fn load_debounce(&self) -> Duration {
        Duration::from_millis(self.load_debounce_ms)
    }
}

impl RenderConfig {
    /// Parse a configuration from TOML text; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RenderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded render config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MailframeError::config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.bridge.mount_retry_interval_ms == 0 {
            return Err(MailframeError::config("mount_retry_interval_ms must be positive"));
        }
        if !(self.layout.viewport_width > 0.0 && self.layout.viewport_height > 0.0) {
            return Err(MailframeError::config("viewport dimensions must be positive"));
        }
        if self.layout.default_font_size <= 0.0 {
            return Err(MailframeError::config("default_font_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.dark_mode.luminance_threshold) {
            return Err(MailframeError::config(format!(
                "luminance_threshold {} is outside [0, 1]",
                self.dark_mode.luminance_threshold
            )));
        }
        if self.oversize.long_url_chunk == 0 {
            return Err(MailframeError::config("long_url_chunk must be positive"));
        }
        Ok(())
    }
}
