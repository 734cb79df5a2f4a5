use mailframe::bridge::{parse_message, SizeCause};
use mailframe::color::{ColorClassifier, Rgba};
use mailframe::content::{Interaction, SetHtmlPayload};
use mailframe::dom::Document;
use mailframe::transform::ImageErrorRecovery;
use mailframe::{ContentEvent, ContentPipeline, EstimatedLayout, EventSink, LayoutProbe, RenderConfig, Viewport};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn layout() -> EstimatedLayout {
    EstimatedLayout::new(Viewport::new(375.0, 667.0), 16.0)
}

fn pipeline() -> (ContentPipeline, UnboundedReceiver<String>) {
    let (sink, rx) = EventSink::channel();
    (ContentPipeline::new(&RenderConfig::default(), Box::new(layout()), sink), rx)
}

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<ContentEvent> {
    let mut events = Vec::new();
    while let Ok(raw) = rx.try_recv() {
        events.push(parse_message(&raw).unwrap());
    }
    events
}

fn count(events: &[ContentEvent], wanted: &ContentEvent) -> usize {
    events.iter().filter(|event| *event == wanted).count()
}

fn heights(events: &[ContentEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            ContentEvent::HeightChange(height) => Some(*height),
            _ => None,
        })
        .collect()
}

#[test]
fn test_plain_light_message_finishes_synchronously() {
    let (mut pipeline, mut rx) = pipeline();
    let payload = SetHtmlPayload::new("<p>Lunch at noon?</p>").to_json().unwrap();
    assert!(pipeline.set_html(&payload).unwrap());

    let document = pipeline.document().unwrap();
    assert!(!document.has_img_or_video);

    let events = drain(&mut rx);
    assert_eq!(
        events[0],
        ContentEvent::Debugger(SizeCause::HtmlReload.as_str().to_string())
    );
    assert_eq!(heights(&events).len(), 1);
    assert_eq!(count(&events, &ContentEvent::OnLoad), 1);
    assert_eq!(count(&events, &ContentEvent::OnLoadFinish), 1);
    assert!(pipeline.all_images_loaded());
}

#[test]
fn test_three_images_with_one_failure_finish_once() {
    let (mut pipeline, mut rx) = pipeline();
    let markup = r#"<p>Photos</p><img src="https://cdn.example/a.png"><img src="https://cdn.example/b.png"><img src="https://cdn.example/c.png">"#;
    let payload = SetHtmlPayload::new(markup)
        .proxy_template(Some("https://proxy.example/i?u={url}".to_string()))
        .to_json()
        .unwrap();
    pipeline.set_html(&payload).unwrap();
    assert!(pipeline.document().unwrap().has_img_or_video);

    let events = drain(&mut rx);
    assert_eq!(count(&events, &ContentEvent::OnLoadFinish), 0);
    assert_eq!(pipeline.listeners().images().len(), 3);

    pipeline.on_image_load(0);
    assert_eq!(
        pipeline.on_image_error(1),
        Some(ImageErrorRecovery::Restored("https://cdn.example/b.png".to_string()))
    );
    assert_eq!(count(&drain(&mut rx), &ContentEvent::OnLoadFinish), 0);

    pipeline.on_image_load(2);
    let events = drain(&mut rx);
    assert_eq!(count(&events, &ContentEvent::OnLoadFinish), 1);
    assert_eq!(
        count(&events, &ContentEvent::Debugger(SizeCause::ImageLoad.as_str().to_string())),
        1
    );

    // The restored original fails too: hidden, but no second completion
    assert_eq!(pipeline.on_image_error(1), Some(ImageErrorRecovery::Hidden));
    let events = drain(&mut rx);
    assert_eq!(count(&events, &ContentEvent::OnLoadFinish), 0);
    assert_eq!(heights(&events).len(), 1);
    assert!(pipeline
        .rendered_html()
        .unwrap()
        .contains(r#"<img src="https://cdn.example/b.png" style="max-width: 100%; display: none;">"#));
}

#[test]
fn test_double_width_message_reports_half_height() {
    let (mut pipeline, mut rx) = pipeline();
    let markup = r#"<table width="750"><tr><td><p>Quarterly newsletter</p><p>Lots of news this quarter.</p></td></tr></table>"#;
    pipeline
        .set_html(&SetHtmlPayload::new(markup).to_json().unwrap())
        .unwrap();

    let scale = pipeline.scale_state();
    assert!((scale.ratio() - 0.5).abs() < 1e-3);

    let fragment = Document::parse_fragment(markup);
    let unscaled = layout().measure(&fragment, fragment.root());
    assert_eq!(unscaled.scroll_width, 750.0);
    assert!(unscaled.scroll_height > 0.0);

    let reported = heights(&drain(&mut rx));
    assert_eq!(reported.len(), 1);
    assert!((reported[0] - f64::from(unscaled.scroll_height * 0.5)).abs() < 1e-3);
    assert_eq!(pipeline.document().unwrap().intrinsic_width, 750.0);
}

#[test]
fn test_same_payload_twice_is_idempotent() {
    let (mut pipeline, mut rx) = pipeline();
    let payload = SetHtmlPayload::new(r#"<a href="https://example.com">x</a><img src="https://cdn.example/a.png">"#)
        .to_json()
        .unwrap();
    pipeline.set_html(&payload).unwrap();
    let document = pipeline.document().cloned();
    let rendered = pipeline.rendered_html();
    pipeline.on_image_load(0);
    drain(&mut rx);

    assert!(!pipeline.set_html(&payload).unwrap());
    assert_eq!(pipeline.document().cloned(), document);
    assert_eq!(pipeline.rendered_html(), rendered);
    assert_eq!(pipeline.listeners().links().len(), 1);
    assert_eq!(pipeline.listeners().images().len(), 1);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(pipeline.passes(), 1);
}

#[test]
fn test_quote_toggle_round_trip() {
    let (mut pipeline, _rx) = pipeline();
    let markup = r#"<p>Sounds good.</p><blockquote type="cite"><p>Shall we meet Friday?</p></blockquote>"#;
    pipeline
        .set_html(&SetHtmlPayload::new(markup).to_json().unwrap())
        .unwrap();
    let collapsed = pipeline.document().unwrap().show_html.clone();
    assert!(!collapsed.contains("Friday"));

    let control = pipeline.page().unwrap().quoted_control.unwrap();
    assert_eq!(pipeline.click(control), Interaction::ToggledQuotedText);
    assert!(pipeline.mode().show_quoted_text);
    assert_eq!(pipeline.document().unwrap().show_html, markup);

    assert!(pipeline.toggle_quoted_text());
    assert_eq!(pipeline.document().unwrap().show_html, collapsed);
}

#[test]
fn test_quotes_kept_when_hiding_is_disabled() {
    let (mut pipeline, _rx) = pipeline();
    let markup = r#"<p>Sounds good.</p><blockquote type="cite"><p>Shall we meet Friday?</p></blockquote>"#;
    let payload = SetHtmlPayload::new(markup)
        .disable_hide_quoted_text(true)
        .to_json()
        .unwrap();
    pipeline.set_html(&payload).unwrap();
    assert_eq!(pipeline.document().unwrap().show_html, markup);
    assert!(pipeline.page().unwrap().quoted_control.is_none());
}

#[test]
fn test_dark_mode_turns_light_backgrounds_dark() {
    let (mut pipeline, _rx) = pipeline();
    let markup = r#"<div style="background-color: #fafafa; color: #222222">Invoice</div>"#;
    pipeline
        .set_html(&SetHtmlPayload::new(markup).dark_mode(true).to_json().unwrap())
        .unwrap();

    let classifier = ColorClassifier::default();
    let page = pipeline.page().unwrap();
    let div = page.document.elements_by_tag(page.content, "div")[0];
    let style = page.document.element(div).unwrap().style();
    let background = Rgba::parse(style.get("background-color").unwrap()).unwrap();
    let text = Rgba::parse(style.get("color").unwrap()).unwrap();
    assert!(!classifier.is_light(&background));
    assert!(classifier.is_light(&text));
}

#[tokio::test(start_paused = true)]
async fn test_dark_mode_load_signal_is_debounced() {
    let (mut pipeline, mut rx) = pipeline();
    let first = SetHtmlPayload::new("<p>One</p>").dark_mode(true).to_json().unwrap();
    let second = SetHtmlPayload::new("<p>Two</p>").dark_mode(true).to_json().unwrap();

    pipeline.set_html(&first).unwrap();
    let events = drain(&mut rx);
    assert_eq!(count(&events, &ContentEvent::OnLoad), 0);
    assert_eq!(heights(&events).len(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    pipeline.set_html(&second).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count(&drain(&mut rx), &ContentEvent::OnLoad), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count(&drain(&mut rx), &ContentEvent::OnLoad), 1);
}

#[test]
fn test_sender_cannot_pick_the_fallback_source() {
    let (mut pipeline, _rx) = pipeline();
    let markup = r#"<p>Hi</p><img src="https://tracker.example/pixel.gif" data-original-src="https://evil.example/x.gif">"#;
    let payload = SetHtmlPayload::new(markup)
        .proxy_template(Some("https://proxy.example/i?u={url}".to_string()))
        .to_json()
        .unwrap();
    pipeline.set_html(&payload).unwrap();

    let show_html = &pipeline.document().unwrap().show_html;
    assert!(show_html.contains(r#"src="https://proxy.example/i?u=https%3A%2F%2Ftracker%2Eexample%2Fpixel%2Egif""#));
    assert!(!show_html.contains("evil.example"));
    assert_eq!(
        pipeline.on_image_error(0),
        Some(ImageErrorRecovery::Restored("https://tracker.example/pixel.gif".to_string()))
    );
}

#[test]
fn test_media_query_mobile_block_survives() {
    let (mut pipeline, _rx) = pipeline();
    let markup = concat!(
        "<style>@media only screen and (max-width: 600px) { .mobile { display: block !important; } }</style>",
        r#"<div style="display: none; max-height: 0; overflow: hidden">Preheader decoy</div>"#,
        r#"<div class="mobile" style="display: none">Show this at the register: SAVE20</div>"#,
        "<p>Desktop offer</p>"
    );
    pipeline
        .set_html(&SetHtmlPayload::new(markup).to_json().unwrap())
        .unwrap();

    let rendered = pipeline.rendered_html().unwrap();
    assert!(rendered.contains("SAVE20"));
    assert!(rendered.contains("Desktop offer"));
    assert!(!rendered.contains("Preheader decoy"));
}

#[test]
fn test_deeply_nested_markup_renders() {
    let (mut pipeline, mut rx) = pipeline();
    let depth = 3000;
    let markup = format!("{}innermost{}", "<div>".repeat(depth), "</div>".repeat(depth));
    assert!(pipeline
        .set_html(&SetHtmlPayload::new(&markup).to_json().unwrap())
        .unwrap());

    assert!(pipeline.rendered_html().unwrap().contains("innermost"));
    let events = drain(&mut rx);
    assert_eq!(heights(&events).len(), 1);
    assert!(heights(&events)[0] > 0.0);
    assert_eq!(count(&events, &ContentEvent::OnLoadFinish), 1);
}
