//! Message bridge between a host shell and the isolated content surface
//!
//! The two sides share nothing but serialized messages: the host injects
//! calls to named entry points, the content surface posts JSON envelopes.

pub mod content;
pub mod host;
pub mod protocol;
pub mod transport;

pub use content::{ContentBridge, EventSink};
pub use host::{HostBridge, HostProps};
pub use protocol::{parse_message, ContentEvent, Envelope, InjectedFunction, ScriptCall, SizeCause};
pub use transport::{loopback, pump_messages, spawn_content, ChannelTransport, ScriptTextTransport, ScriptTransport};
