pub mod bootstrap;
pub mod bridge;
pub mod color;
pub mod config;
pub mod content;
pub mod dom;
pub mod error;
pub mod layout;
pub mod transform;

pub use bridge::{ContentBridge, ContentEvent, EventSink, HostBridge, HostProps, InjectedFunction, ScriptCall};
pub use config::RenderConfig;
pub use content::{ContentPipeline, Platform, SetHtmlPayload};
pub use error::{MailframeError, Result};
pub use layout::{EstimatedLayout, LayoutProbe, Viewport};
