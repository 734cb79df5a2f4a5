//! Host side of the bridge
//!
//! Holds the mount flag and at most one pending delivery per entry point.
//! Calls made before the content surface announces itself are retried on a
//! fixed interval; a newer call for the same entry point replaces the older
//! one. Once `isMounted` arrives the latest argument of each entry point is
//! delivered immediately, exactly once.

use super::protocol::{parse_message, ContentEvent, InjectedFunction, ScriptCall};
use super::transport::ScriptTransport;
use crate::config::BridgeSettings;
use crate::content::{Platform, SetHtmlPayload};
use crate::error::{MailframeError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Inputs the host renders the content surface from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostProps {
    /// Raw message markup, not yet encoded
    pub html: String,
    pub is_dark_mode: bool,
    pub is_preview_mode: bool,
    pub image_proxy_template: Option<String>,
    pub disable_hide_quoted_text: bool,
    pub platform: Platform,
}

impl HostProps {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Self::default()
        }
    }

    /// The `setHTML` argument for these props
    pub fn set_html_argument(&self) -> Result<String> {
        SetHtmlPayload::new(&self.html)
            .dark_mode(self.is_dark_mode)
            .proxy_template(self.image_proxy_template.clone())
            .disable_hide_quoted_text(self.disable_hide_quoted_text)
            .platform(self.platform)
            .to_json()
    }

    pub fn preview_mode_argument(&self) -> String {
        self.is_preview_mode.to_string()
    }

    fn argument_for(&self, function: InjectedFunction) -> Result<String> {
        match function {
            InjectedFunction::SetHtml => self.set_html_argument(),
            InjectedFunction::SetPreviewMode => Ok(self.preview_mode_argument()),
        }
    }
}

#[derive(Debug)]
struct PendingCall {
    generation: u64,
    argument: Option<String>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct HostState {
    mounted: bool,
    torn_down: bool,
    props: HostProps,
    pending: HashMap<InjectedFunction, PendingCall>,
    next_generation: u64,
}

struct Inner<T> {
    transport: T,
    retry_interval: Duration,
    state: Mutex<HostState>,
    events: UnboundedSender<ContentEvent>,
}

pub struct HostBridge<T: ScriptTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: ScriptTransport> Clone for HostBridge<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ScriptTransport> HostBridge<T> {
    /// Create a bridge; the receiver yields every content event other than
    /// `isMounted`
    pub fn new(transport: T, props: HostProps, settings: &BridgeSettings) -> (Self, UnboundedReceiver<ContentEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            inner: Arc::new(Inner {
                transport,
                retry_interval: settings.mount_retry_interval(),
                state: Mutex::new(HostState {
                    props,
                    ..HostState::default()
                }),
                events,
            }),
        };
        (bridge, rx)
    }

    pub async fn is_mounted(&self) -> bool {
        self.inner.state.lock().await.mounted
    }

    /// Number of entry points with a delivery waiting for mount
    pub async fn pending_count(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    pub async fn props(&self) -> HostProps {
        self.inner.state.lock().await.props.clone()
    }

    /// Call `function` on the content surface, now if mounted, otherwise as
    /// soon as it is
    pub async fn execute_script(&self, function: InjectedFunction, argument: Option<String>) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.torn_down {
            return Err(MailframeError::TornDown);
        }
        if let Some(previous) = state.pending.remove(&function) {
            if let Some(handle) = previous.handle {
                handle.abort();
            }
            debug!("Superseding pending {} call", function);
        }
        if state.mounted {
            drop(state);
            return self.inner.transport.inject(ScriptCall::new(function, argument));
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let bridge = self.clone();
        let handle = tokio::spawn(async move {
            bridge.retry_until_mounted(function, generation).await;
        });
        state.pending.insert(
            function,
            PendingCall {
                generation,
                argument,
                handle: Some(handle),
            },
        );
        Ok(())
    }

    async fn retry_until_mounted(&self, function: InjectedFunction, generation: u64) {
        loop {
            tokio::time::sleep(self.inner.retry_interval).await;
            let mut state = self.inner.state.lock().await;
            let current = state.pending.get(&function).map(|pending| pending.generation);
            if state.torn_down || current != Some(generation) {
                return;
            }
            if !state.mounted {
                continue;
            }
            let argument = state.pending.remove(&function).and_then(|pending| pending.argument);
            drop(state);
            if let Err(e) = self.inner.transport.inject(ScriptCall::new(function, argument)) {
                warn!("Delivering {} failed: {}", function, e);
            }
            return;
        }
    }

    /// Handle one raw message posted by the content surface.
    ///
    /// Malformed or unknown envelopes are logged and dropped.
    pub async fn on_message(&self, raw: &str) {
        let event = match parse_message(raw) {
            Ok(event) => event,
            Err(e) => {
                debug!("Dropping content message: {}", e);
                return;
            }
        };
        if event == ContentEvent::IsMounted {
            if let Err(e) = self.on_mounted().await {
                warn!("Bridge bootstrap failed: {}", e);
            }
            return;
        }
        if self.inner.events.send(event).is_err() {
            debug!("No listener for content events");
        }
    }

    /// Flip the mount flag and push the baseline: the latest `setHTML` and
    /// `setPreviewMode` arguments
    async fn on_mounted(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.torn_down {
            return Err(MailframeError::TornDown);
        }
        if state.mounted {
            debug!("Ignoring repeated isMounted");
            return Ok(());
        }
        state.mounted = true;
        info!("Content surface mounted");

        let mut calls = Vec::with_capacity(InjectedFunction::ALL.len());
        for function in InjectedFunction::ALL {
            let argument = match state.pending.remove(&function) {
                Some(pending) => {
                    if let Some(handle) = pending.handle {
                        handle.abort();
                    }
                    pending.argument
                }
                None => Some(state.props.argument_for(function)?),
            };
            calls.push(ScriptCall::new(function, argument));
        }
        drop(state);

        for call in calls {
            self.inner.transport.inject(call)?;
        }
        Ok(())
    }

    /// Replace the props and push whatever they changed
    pub async fn update_props(&self, props: HostProps) -> Result<()> {
        let previous = {
            let mut state = self.inner.state.lock().await;
            std::mem::replace(&mut state.props, props.clone())
        };
        let html_changed = previous.html != props.html
            || previous.is_dark_mode != props.is_dark_mode
            || previous.image_proxy_template != props.image_proxy_template
            || previous.disable_hide_quoted_text != props.disable_hide_quoted_text
            || previous.platform != props.platform;
        if html_changed {
            self.execute_script(InjectedFunction::SetHtml, Some(props.set_html_argument()?))
                .await?;
        }
        if previous.is_preview_mode != props.is_preview_mode {
            self.execute_script(InjectedFunction::SetPreviewMode, Some(props.preview_mode_argument()))
                .await?;
        }
        Ok(())
    }

    /// Cancel every pending delivery; later calls fail with `TornDown`
    pub async fn teardown(&self) {
        let mut state = self.inner.state.lock().await;
        state.torn_down = true;
        for (function, pending) in state.pending.drain() {
            if let Some(handle) = pending.handle {
                handle.abort();
            }
            debug!("Dropped pending {} call on teardown", function);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::transport::loopback;

    fn settings() -> BridgeSettings {
        BridgeSettings::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_mount_call_waits_and_is_superseded() {
        let (transport, mut calls) = loopback();
        let (bridge, _events) = HostBridge::new(transport, HostProps::new("<p>a</p>"), &settings());

        bridge
            .execute_script(InjectedFunction::SetPreviewMode, Some("false".to_string()))
            .await
            .unwrap();
        bridge
            .execute_script(InjectedFunction::SetPreviewMode, Some("true".to_string()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(550)).await;
        assert!(calls.try_recv().is_err());
        assert_eq!(bridge.pending_count().await, 1);

        bridge.on_message(r#"{"type":"isMounted","data":true}"#).await;
        let first = calls.try_recv().unwrap();
        assert_eq!(first.function, InjectedFunction::SetHtml);
        let second = calls.try_recv().unwrap();
        assert_eq!(second, ScriptCall::new(InjectedFunction::SetPreviewMode, Some("true".to_string())));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(calls.try_recv().is_err());
        assert_eq!(bridge.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_mounted_calls_go_straight_through() {
        let (transport, mut calls) = loopback();
        let (bridge, _events) = HostBridge::new(transport, HostProps::default(), &settings());
        bridge.on_message(r#"{"type":"isMounted","data":true}"#).await;
        while calls.try_recv().is_ok() {}

        bridge
            .execute_script(InjectedFunction::SetPreviewMode, Some("true".to_string()))
            .await
            .unwrap();
        assert_eq!(calls.try_recv().unwrap().argument.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_events_are_forwarded_and_garbage_dropped() {
        let (transport, _calls) = loopback();
        let (bridge, mut events) = HostBridge::new(transport, HostProps::default(), &settings());
        bridge.on_message("{{{").await;
        bridge.on_message(r#"{"type":"launchRockets"}"#).await;
        bridge.on_message(r#"{"type":"heightChange","data":120}"#).await;
        assert_eq!(events.try_recv().unwrap(), ContentEvent::HeightChange(120.0));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_retries() {
        let (transport, mut calls) = loopback();
        let (bridge, _events) = HostBridge::new(transport, HostProps::default(), &settings());
        bridge
            .execute_script(InjectedFunction::SetHtml, Some("{}".to_string()))
            .await
            .unwrap();
        bridge.teardown().await;
        assert_eq!(bridge.pending_count().await, 0);
        assert!(matches!(
            bridge.execute_script(InjectedFunction::SetHtml, None).await,
            Err(MailframeError::TornDown)
        ));
        bridge.on_message(r#"{"type":"isMounted","data":true}"#).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_props_pushes_only_changes() {
        let (transport, mut calls) = loopback();
        let (bridge, _events) = HostBridge::new(transport, HostProps::new("<p>a</p>"), &settings());
        bridge.on_message(r#"{"type":"isMounted","data":true}"#).await;
        while calls.try_recv().is_ok() {}

        let mut props = bridge.props().await;
        props.is_preview_mode = true;
        bridge.update_props(props.clone()).await.unwrap();
        assert_eq!(
            calls.try_recv().unwrap(),
            ScriptCall::new(InjectedFunction::SetPreviewMode, Some("true".to_string()))
        );
        assert!(calls.try_recv().is_err());

        props.is_dark_mode = true;
        bridge.update_props(props).await.unwrap();
        let call = calls.try_recv().unwrap();
        assert_eq!(call.function, InjectedFunction::SetHtml);
        let payload = SetHtmlPayload::from_json(call.argument.as_deref().unwrap()).unwrap();
        assert!(payload.is_dark_mode);
        assert_eq!(payload.decode_html().unwrap(), "<p>a</p>");
    }
}
