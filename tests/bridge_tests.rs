use mailframe::bridge::{loopback, pump_messages, spawn_content, ChannelTransport};
use mailframe::config::BridgeSettings;
use mailframe::{
    ContentBridge, ContentEvent, ContentPipeline, EstimatedLayout, EventSink, HostBridge, HostProps,
    InjectedFunction, RenderConfig, ScriptCall, SetHtmlPayload, Viewport,
};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const MOUNTED: &str = r#"{"type":"isMounted","data":true}"#;

fn host(props: HostProps) -> (
    HostBridge<ChannelTransport>,
    UnboundedReceiver<ContentEvent>,
    UnboundedReceiver<ScriptCall>,
) {
    let (transport, calls) = loopback();
    let (bridge, events) = HostBridge::new(transport, props, &BridgeSettings::default());
    (bridge, events, calls)
}

fn drain_calls(calls: &mut UnboundedReceiver<ScriptCall>) -> Vec<ScriptCall> {
    let mut received = Vec::new();
    while let Ok(call) = calls.try_recv() {
        received.push(call);
    }
    received
}

fn set_html_calls(calls: &[ScriptCall]) -> Vec<&ScriptCall> {
    calls
        .iter()
        .filter(|call| call.function == InjectedFunction::SetHtml)
        .collect()
}

fn html_argument(markup: &str) -> String {
    SetHtmlPayload::new(markup).to_json().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_no_pre_mount_calls_bootstraps_from_props() {
    let (bridge, _events, mut calls) = host(HostProps::new("<p>props</p>"));
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(drain_calls(&mut calls).is_empty());

    bridge.on_message(MOUNTED).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let received = drain_calls(&mut calls);
    assert_eq!(received.len(), 2);
    assert_eq!(set_html_calls(&received)[0].argument, Some(html_argument("<p>props</p>")));
    assert_eq!(
        received[1],
        ScriptCall::new(InjectedFunction::SetPreviewMode, Some("false".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_single_pre_mount_call_delivered_once_after_mount() {
    let (bridge, _events, mut calls) = host(HostProps::default());
    bridge
        .execute_script(InjectedFunction::SetHtml, Some(html_argument("<p>one</p>")))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert!(drain_calls(&mut calls).is_empty());

    bridge.on_message(MOUNTED).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let received = drain_calls(&mut calls);
    let html = set_html_calls(&received);
    assert_eq!(html.len(), 1);
    assert_eq!(html[0].argument, Some(html_argument("<p>one</p>")));
}

#[tokio::test(start_paused = true)]
async fn test_many_pre_mount_calls_deliver_only_the_latest() {
    let (bridge, _events, mut calls) = host(HostProps::default());
    for index in 0..6 {
        bridge
            .execute_script(InjectedFunction::SetHtml, Some(html_argument(&format!("<p>{}</p>", index))))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;
    }
    assert_eq!(bridge.pending_count().await, 1);
    assert!(drain_calls(&mut calls).is_empty());

    bridge.on_message(MOUNTED).await;
    bridge.on_message(MOUNTED).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    let received = drain_calls(&mut calls);
    let html = set_html_calls(&received);
    assert_eq!(html.len(), 1);
    assert_eq!(html[0].argument, Some(html_argument("<p>5</p>")));
    assert_eq!(received.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pre_mount_prop_updates_deliver_latest_props() {
    let (bridge, _events, mut calls) = host(HostProps::new("<p>a</p>"));
    for markup in ["<p>b</p>", "<p>c</p>"] {
        let mut props = bridge.props().await;
        props.html = markup.to_string();
        bridge.update_props(props).await.unwrap();
    }
    let mut props = bridge.props().await;
    props.is_preview_mode = true;
    bridge.update_props(props).await.unwrap();

    bridge.on_message(MOUNTED).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let received = drain_calls(&mut calls);
    assert_eq!(received.len(), 2);
    assert_eq!(set_html_calls(&received)[0].argument, Some(html_argument("<p>c</p>")));
    assert_eq!(received[1].argument.as_deref(), Some("true"));
}

#[tokio::test]
async fn test_malformed_envelopes_do_not_break_the_bridge() {
    let (bridge, mut events, _calls) = host(HostProps::default());
    for raw in ["", "null", "[1,2]", r#"{"type":7}"#, r#"{"type":"heightChange","data":"tall"}"#] {
        bridge.on_message(raw).await;
    }
    bridge.on_message(r#"{"type":"clickLink","data":"https://example.com"}"#).await;
    assert_eq!(
        events.recv().await,
        Some(ContentEvent::ClickLink("https://example.com".to_string()))
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_loopback() {
    let config = RenderConfig::default();
    let (sink, messages) = EventSink::channel();
    let layout = EstimatedLayout::new(Viewport::new(375.0, 667.0), 16.0);
    let pipeline = ContentPipeline::new(&config, Box::new(layout), sink.clone());
    let content = ContentBridge::new(pipeline, sink);

    let (transport, calls) = loopback();
    let (host, mut events) = HostBridge::new(transport, HostProps::new("<p>Hello from the host</p>"), &config.bridge);

    let pump_host = host.clone();
    let pump = tokio::spawn(pump_messages(messages, move |raw| {
        let host = pump_host.clone();
        async move { host.on_message(&raw).await }
    }));
    let content_task = spawn_content(content, calls);

    let mut received = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
        received.push(event);
    }
    assert!(host.is_mounted().await);
    assert_eq!(
        received,
        vec![
            ContentEvent::Debugger("html-reload".to_string()),
            received[1].clone(),
            ContentEvent::OnLoad,
            ContentEvent::OnLoadFinish,
        ]
    );
    assert!(matches!(received[1], ContentEvent::HeightChange(height) if height > 0.0));

    host.teardown().await;
    pump.abort();
    content_task.abort();
}
