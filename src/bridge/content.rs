//! Content side of the bridge
//!
//! Installs the injected entry points on top of a [`ContentPipeline`] and
//! posts [`ContentEvent`]s back to the host as JSON envelopes.

use super::protocol::{ContentEvent, InjectedFunction, ScriptCall};
use crate::content::ContentPipeline;
use crate::error::{MailframeError, Result};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Outbound message channel of the content surface
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<String>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Post one event; returns false if it could not be delivered
    pub fn emit(&self, event: &ContentEvent) -> bool {
        let raw = match event.to_json() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode {} event: {}", event.name(), e);
                return false;
            }
        };
        if self.tx.send(raw).is_err() {
            debug!("Host channel closed, dropping {} event", event.name());
            return false;
        }
        true
    }
}

type Handler = fn(&mut ContentPipeline, Option<&str>) -> Result<()>;

fn set_html(pipeline: &mut ContentPipeline, argument: Option<&str>) -> Result<()> {
    pipeline.set_html(argument.unwrap_or_default()).map(|_| ())
}

fn set_preview_mode(pipeline: &mut ContentPipeline, argument: Option<&str>) -> Result<()> {
    pipeline.set_preview_mode(argument.unwrap_or_default());
    Ok(())
}

/// The content surface as seen by the host: a table of named entry points
pub struct ContentBridge {
    pipeline: ContentPipeline,
    handlers: HashMap<InjectedFunction, Handler>,
    sink: EventSink,
    mounted: bool,
}

impl ContentBridge {
    pub fn new(pipeline: ContentPipeline, sink: EventSink) -> Self {
        let mut handlers: HashMap<InjectedFunction, Handler> = HashMap::new();
        handlers.insert(InjectedFunction::SetHtml, set_html);
        handlers.insert(InjectedFunction::SetPreviewMode, set_preview_mode);
        Self {
            pipeline,
            handlers,
            sink,
            mounted: false,
        }
    }

    /// Announce readiness; only the first call posts `isMounted`
    pub fn mount(&mut self) -> bool {
        if self.mounted || self.handlers.is_empty() {
            return false;
        }
        self.mounted = true;
        info!("Content surface mounted");
        self.sink.emit(&ContentEvent::IsMounted)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn invoke(&mut self, call: &ScriptCall) -> Result<()> {
        if self.handlers.is_empty() {
            return Err(MailframeError::TornDown);
        }
        let handler = self
            .handlers
            .get(&call.function)
            .copied()
            .ok_or_else(|| MailframeError::UnknownCommand(call.function.to_string()))?;
        debug!("Invoking {}", call.function);
        handler(&mut self.pipeline, call.argument.as_deref())
    }

    /// Uninstall the entry points; later calls fail with `TornDown`
    pub fn teardown(&mut self) {
        self.handlers.clear();
        self.pipeline.teardown();
    }

    pub fn pipeline(&self) -> &ContentPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut ContentPipeline {
        &mut self.pipeline
    }

    /// Mount, then apply calls until the host side hangs up
    pub async fn serve(&mut self, mut calls: UnboundedReceiver<ScriptCall>) {
        self.mount();
        while let Some(call) = calls.recv().await {
            if let Err(e) = self.invoke(&call) {
                warn!("{} failed: {}", call.function, e);
                if matches!(e, MailframeError::TornDown) {
                    break;
                }
            }
        }
        debug!("Content bridge stopped serving");
    }
}
