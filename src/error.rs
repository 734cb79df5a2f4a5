//! Crate-wide error type

use thiserror::Error;

/// Errors raised while decoding payloads, loading configuration or driving the bridge.
///
/// Pipeline stages never surface these to the viewer: a failing stage is logged
/// and skipped so the document still renders.
#[derive(Debug, Error)]
pub enum MailframeError {
    #[error("Payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown bridge command: {0}")]
    UnknownCommand(String),

    #[error("Unknown bridge event: {0}")]
    UnknownEvent(String),

    #[error("Bridge has been torn down")]
    TornDown,

    #[error("Stage {stage} failed: {message}")]
    Stage {
        stage: &'static str,
        message: String,
    },

    #[error("Malformed node: {0}")]
    MalformedNode(String),
}

impl MailframeError {
    /// Create a stage failure
    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        MailframeError::Stage {
            stage,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        MailframeError::Config(message.into())
    }

    /// Create a malformed node error
    pub fn malformed(message: impl Into<String>) -> Self {
        MailframeError::MalformedNode(message.into())
    }

    /// Whether rendering can continue past this error.
    ///
    /// Decode errors abort a whole `setHTML` application; everything else is
    /// contained to a node, a stage or a single message.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Base64(_) | Self::Utf8(_) | Self::TornDown | Self::ConfigParse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MailframeError>;
