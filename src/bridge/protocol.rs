//! Wire format shared by both sides of the bridge
//!
//! Host to content: a named entry point called with at most one string
//! argument. Content to host: a `{"type": ..., "data": ...}` JSON envelope.

use crate::error::{MailframeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Entry points the content surface installs for the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectedFunction {
    SetHtml,
    SetPreviewMode,
}

impl InjectedFunction {
    pub const ALL: [InjectedFunction; 2] = [InjectedFunction::SetHtml, InjectedFunction::SetPreviewMode];

    pub fn name(&self) -> &'static str {
        match self {
            InjectedFunction::SetHtml => "setHTML",
            InjectedFunction::SetPreviewMode => "setPreviewMode",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|function| function.name() == name)
            .ok_or_else(|| MailframeError::UnknownCommand(name.to_string()))
    }
}

impl fmt::Display for InjectedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One host-to-content invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCall {
    pub function: InjectedFunction,
    pub argument: Option<String>,
}

impl ScriptCall {
    pub fn new(function: InjectedFunction, argument: Option<String>) -> Self {
        Self { function, argument }
    }

    /// The call as evaluable script, for transports that inject JavaScript
    pub fn to_script(&self) -> String {
        let name = self.function.name();
        let argument = self
            .argument
            .as_deref()
            .filter(|argument| !argument.is_empty())
            .map(|argument| format!("'{}'", escape_single_quoted(argument)))
            .unwrap_or_default();
        format!("window.{name} && window.{name}({argument});true;")
    }
}

fn escape_single_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            '<' => out.push_str("\\x3c"),
            c => out.push(c),
        }
    }
    out
}

/// Why a height report was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCause {
    HtmlReload,
    ImageLoad,
    WindowResize,
}

impl SizeCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeCause::HtmlReload => "html-reload",
            SizeCause::ImageLoad => "image-load",
            SizeCause::WindowResize => "window-resize",
        }
    }
}

/// Content-to-host messages
#[derive(Debug, Clone, PartialEq)]
pub enum ContentEvent {
    IsMounted,
    OnLoad,
    OnLoadFinish,
    HeightChange(f64),
    ClickLink(String),
    Debugger(String),
    ImageDownload(String),
}

impl ContentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ContentEvent::IsMounted => "isMounted",
            ContentEvent::OnLoad => "onLoad",
            ContentEvent::OnLoadFinish => "onLoadFinish",
            ContentEvent::HeightChange(_) => "heightChange",
            ContentEvent::ClickLink(_) => "clickLink",
            ContentEvent::Debugger(_) => "debugger",
            ContentEvent::ImageDownload(_) => "onImageDownload",
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        let data = match self {
            ContentEvent::IsMounted | ContentEvent::OnLoad | ContentEvent::OnLoadFinish => Value::Bool(true),
            ContentEvent::HeightChange(height) => serde_json::Number::from_f64(*height)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ContentEvent::ClickLink(text) | ContentEvent::Debugger(text) | ContentEvent::ImageDownload(text) => {
                Value::String(text.clone())
            }
        };
        Envelope {
            kind: self.name().to_string(),
            data,
        }
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let text = |data: Value| match data {
            Value::String(text) => Ok(text),
            other => Err(MailframeError::UnknownEvent(format!(
                "{} carries non-string data {}",
                envelope.kind, other
            ))),
        };
        match envelope.kind.as_str() {
            "isMounted" => Ok(ContentEvent::IsMounted),
            "onLoad" => Ok(ContentEvent::OnLoad),
            "onLoadFinish" => Ok(ContentEvent::OnLoadFinish),
            "heightChange" => envelope
                .data
                .as_f64()
                .map(ContentEvent::HeightChange)
                .ok_or_else(|| MailframeError::UnknownEvent("heightChange without a number".to_string())),
            "clickLink" => text(envelope.data.clone()).map(ContentEvent::ClickLink),
            "debugger" => text(envelope.data.clone()).map(ContentEvent::Debugger),
            "onImageDownload" => text(envelope.data.clone()).map(ContentEvent::ImageDownload),
            other => Err(MailframeError::UnknownEvent(other.to_string())),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_envelope())?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// Decode one raw message posted by the content surface
pub fn parse_message(raw: &str) -> Result<ContentEvent> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    ContentEvent::from_envelope(envelope)
}
