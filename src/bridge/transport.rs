//! Delivery channels between the host bridge and the content surface

use super::content::ContentBridge;
use super::protocol::ScriptCall;
use crate::error::{MailframeError, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Host-side injection primitive
pub trait ScriptTransport: Send + Sync + 'static {
    fn inject(&self, call: ScriptCall) -> Result<()>;
}

/// Delivers structured calls, for in-process content surfaces
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: UnboundedSender<ScriptCall>,
}

impl ChannelTransport {
    pub fn new(tx: UnboundedSender<ScriptCall>) -> Self {
        Self { tx }
    }
}

impl ScriptTransport for ChannelTransport {
    fn inject(&self, call: ScriptCall) -> Result<()> {
        self.tx.send(call).map_err(|_| MailframeError::TornDown)
    }
}

/// Delivers the evaluable script text, for WebView-style hosts
#[derive(Debug, Clone)]
pub struct ScriptTextTransport {
    tx: UnboundedSender<String>,
}

impl ScriptTextTransport {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl ScriptTransport for ScriptTextTransport {
    fn inject(&self, call: ScriptCall) -> Result<()> {
        self.tx.send(call.to_script()).map_err(|_| MailframeError::TornDown)
    }
}

/// A transport plus the receiving end to hand to a [`ContentBridge`]
pub fn loopback() -> (ChannelTransport, UnboundedReceiver<ScriptCall>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelTransport::new(tx), rx)
}

/// Forward raw content messages to a handler until either side closes
pub async fn pump_messages<F, Fut>(mut messages: UnboundedReceiver<String>, mut handler: F)
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    while let Some(raw) = messages.recv().await {
        handler(raw).await;
    }
    debug!("Content message stream closed");
}

/// Serve `bridge` on its own task
pub fn spawn_content(
    mut bridge: ContentBridge,
    calls: UnboundedReceiver<ScriptCall>,
) -> tokio::task::JoinHandle<ContentBridge> {
    tokio::spawn(async move {
        bridge.serve(calls).await;
        bridge
    })
}
