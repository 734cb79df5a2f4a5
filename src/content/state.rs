//! Render state owned by the content pipeline

use crate::error::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// Host platform the content surface runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    #[default]
    Android,
    Windows,
    Macos,
    Web,
}

impl Platform {
    /// iOS offers its own image menu, so long-press download is not wired there
    pub fn supports_long_press_download(&self) -> bool {
        !matches!(self, Platform::Ios)
    }
}

/// JSON argument of the `setHTML` entry point
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetHtmlPayload {
    /// Base64 of the UTF-8 markup
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_proxy_template: Option<String>,
    #[serde(default)]
    pub is_dark_mode: bool,
    // The misspelling is part of the wire format
    #[serde(default, rename = "disabeHideQuotedText", alias = "disableHideQuotedText")]
    pub disable_hide_quoted_text: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl SetHtmlPayload {
    pub fn new(markup: &str) -> Self {
        Self {
            html: general_purpose::STANDARD.encode(markup.as_bytes()),
            ..Self::default()
        }
    }

    pub fn dark_mode(mut self, enabled: bool) -> Self {
        self.is_dark_mode = enabled;
        self
    }

    pub fn proxy_template(mut self, template: Option<String>) -> Self {
        self.image_proxy_template = template;
        self
    }

    pub fn disable_hide_quoted_text(mut self, disabled: bool) -> Self {
        self.disable_hide_quoted_text = disabled;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode_html(&self) -> Result<String> {
        let bytes = general_purpose::STANDARD.decode(self.html.trim())?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Display switches; any change re-runs the mode-dependent stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderMode {
    pub is_dark_mode: bool,
    pub is_preview_mode: bool,
    pub show_quoted_text: bool,
    pub disable_hide_quoted_text: bool,
}

impl RenderMode {
    /// Whether the full markup (quotes included) is displayed
    pub fn shows_full_markup(&self) -> bool {
        self.show_quoted_text || self.disable_hide_quoted_text
    }
}

/// One email body as received, plus the variant currently displayed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentDocument {
    /// Normalized markup with quotes intact (meta-stripped, proxied)
    pub html: String,
    /// Markup actually rendered: `html` or its quote-collapsed variant
    pub show_html: String,
    pub has_img_or_video: bool,
    /// Layout size of the rendered container after the last pass, in CSS px
    pub intrinsic_width: f32,
    pub intrinsic_height: f32,
}

/// The inputs a pipeline pass depends on; passes run only when this changes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct PassKey {
    pub show_html: String,
    pub is_dark_mode: bool,
    pub is_preview_mode: bool,
}
