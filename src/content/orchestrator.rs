//! The content-side controller
//!
//! Owns the render state of one content surface, decides when a pipeline pass
//! is due and reports lifecycle events to the host.

use super::debounce::Debouncer;
use super::instrumentation::{ImageTracker, Listeners};
use super::page::{Page, PageTheme};
use super::state::{ContentDocument, PassKey, Platform, RenderMode, SetHtmlPayload};
use crate::bridge::content::EventSink;
use crate::bridge::protocol::{ContentEvent, SizeCause};
use crate::color::{ColorClassifier, Rgba};
use crate::config::RenderConfig;
use crate::dom::NodeId;
use crate::error::Result;
use crate::layout::{LayoutProbe, Viewport};
use crate::transform::image_proxy::handle_image_load_error;
use crate::transform::{
    add_proxy_for_images, strip_viewport_overrides, DarkModeEngine, HiddenContentStripper,
    ImageErrorRecovery, OversizeFixer, ProxyTemplate, QuotedTextEngine, ScaleState, ScalingEngine,
};
use tracing::{debug, info};

/// What a simulated tap on the page did
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    ToggledQuotedText,
    OpenedLink(String),
    HidObject,
    Ignored,
}

pub struct ContentPipeline {
    theme: PageTheme,
    layout: Box<dyn LayoutProbe>,
    quoted: QuotedTextEngine,
    dark_mode: DarkModeEngine,
    oversize: OversizeFixer,
    scaling: ScalingEngine,
    hidden: HiddenContentStripper,

    document: Option<ContentDocument>,
    mode: RenderMode,
    platform: Platform,
    page: Option<Page>,
    rendered: Option<PassKey>,
    listeners: Listeners,
    images: ImageTracker,
    scale: ScaleState,
    all_images_loaded: bool,
    fullscreen: bool,
    passes: usize,

    sink: EventSink,
    load_debouncer: Debouncer,
}

impl ContentPipeline {
    pub fn new(config: &RenderConfig, layout: Box<dyn LayoutProbe>, sink: EventSink) -> Self {
        let mut classifier = ColorClassifier::new(config.dark_mode.luminance_threshold);
        if let Some(surface) = Rgba::parse(&config.dark_mode.background) {
            classifier = classifier.with_dark_surface(surface);
        }
        Self {
            theme: PageTheme::from_config(config),
            layout,
            quoted: QuotedTextEngine::default(),
            dark_mode: DarkModeEngine::new(classifier),
            oversize: OversizeFixer::new(config.oversize.long_url_threshold, config.oversize.long_url_chunk),
            scaling: ScalingEngine::new(config.layout.overflow_slack, config.layout.default_font_size),
            hidden: HiddenContentStripper::new(config.hidden_content.clone()),
            document: None,
            mode: RenderMode::default(),
            platform: Platform::default(),
            page: None,
            rendered: None,
            listeners: Listeners::default(),
            images: ImageTracker::default(),
            scale: ScaleState::identity(),
            all_images_loaded: false,
            fullscreen: false,
            passes: 0,
            sink,
            load_debouncer: Debouncer::new(config.bridge.load_debounce()),
        }
    }

    pub fn with_quoted_engine(mut self, engine: QuotedTextEngine) -> Self {
        self.quoted = engine;
        self
    }

    /// Apply a `setHTML` argument. Returns whether a pipeline pass ran.
    ///
    /// A payload that fails to decode is rejected as a whole and the current
    /// document stays on screen.
    pub fn set_html(&mut self, argument: &str) -> Result<bool> {
        let payload = SetHtmlPayload::from_json(argument)?;
        if payload.html.is_empty() {
            debug!("Ignoring setHTML without markup");
            return Ok(false);
        }
        let markup = payload.decode_html()?;
        let markup = strip_viewport_overrides(&markup);
        let template = payload
            .image_proxy_template
            .as_deref()
            .and_then(ProxyTemplate::new);
        let proxied = add_proxy_for_images(&markup, template.as_ref());

        let mode = RenderMode {
            is_dark_mode: payload.is_dark_mode,
            disable_hide_quoted_text: payload.disable_hide_quoted_text,
            ..self.mode
        };
        let show_html = self.display_variant(&proxied.html, &mode);
        let mut next = ContentDocument {
            html: proxied.html,
            show_html,
            has_img_or_video: proxied.has_img_or_video,
            ..ContentDocument::default()
        };

        match &self.document {
            Some(previous) if previous.html == next.html => {
                if previous.show_html == next.show_html {
                    next.intrinsic_width = previous.intrinsic_width;
                    next.intrinsic_height = previous.intrinsic_height;
                }
            }
            _ => self.all_images_loaded = false,
        }

        self.document = Some(next);
        self.mode = mode;
        if let Some(platform) = payload.platform {
            self.platform = platform;
        }
        Ok(self.refresh())
    }

    /// Apply a `setPreviewMode` argument (`"true"` or anything else)
    pub fn set_preview_mode(&mut self, flag: &str) -> bool {
        self.mode.is_preview_mode = flag.trim() == "true";
        self.refresh()
    }

    /// Swap between the full and the quote-collapsed markup
    pub fn toggle_quoted_text(&mut self) -> bool {
        let Some(current) = self.document.clone() else {
            return false;
        };
        self.mode.show_quoted_text = !self.mode.show_quoted_text;
        let show_html = self.display_variant(&current.html, &self.mode);
        self.document = Some(ContentDocument { show_html, ..current });
        self.refresh()
    }

    fn display_variant(&self, html: &str, mode: &RenderMode) -> String {
        if mode.shows_full_markup() {
            html.to_string()
        } else {
            self.quoted.remove_quoted_html(html)
        }
    }

    fn pass_key(&self) -> Option<PassKey> {
        self.document.as_ref().map(|document| PassKey {
            show_html: document.show_html.clone(),
            is_dark_mode: self.mode.is_dark_mode,
            is_preview_mode: self.mode.is_preview_mode,
        })
    }

    /// Run a pass when the displayed markup or a display mode changed
    fn refresh(&mut self) -> bool {
        let key = self.pass_key();
        if key.is_none() || key == self.rendered {
            return false;
        }
        self.on_content_change();
        true
    }

    fn on_content_change(&mut self) {
        let (Some(document), Some(key)) = (self.document.clone(), self.pass_key()) else {
            return;
        };
        let same_markup = self
            .rendered
            .as_ref()
            .map(|rendered| rendered.show_html == key.show_html)
            .unwrap_or(false);
        let with_control = !self.mode.disable_hide_quoted_text && self.quoted.has_quoted_html(&document.html);
        let mut page = Page::render(
            &document.show_html,
            &self.mode,
            document.has_img_or_video,
            with_control,
            &self.theme,
        );
        let container = page.container;

        if self.mode.is_dark_mode {
            let report = self.dark_mode.apply(&mut page.document, container);
            debug!("Dark mode rewrote {} of {} elements", report.changed, report.visited);
        }

        self.listeners.clear();
        self.listeners.attach_links(&page.document, container);
        self.listeners.attach_images(&page.document, container, self.platform);
        self.listeners.attach_objects(&page.document, container);

        self.oversize.fix_long_urls(&mut page.document, container);
        let container_width = self.layout.measure(&page.document, container).offset_width;
        self.oversize.limit_image_width(&mut page.document, container, container_width);

        let outcome = self
            .scaling
            .apply(&mut page.document, page.body, container, self.layout.as_ref());
        self.scale = outcome.state;

        let stripped = self.hidden.apply(&mut page.document, container);
        if stripped.changed > 0 {
            debug!("Stripped {} hidden element(s)", stripped.changed);
        }
        self.listeners.retain_connected(&page.document);

        let image_count = self.listeners.images().len();
        if !same_markup || self.images.len() != image_count {
            self.images = ImageTracker::new(image_count);
        } else {
            // Same elements as before: replay earlier error resets onto the fresh nodes
            for (index, node) in self.listeners.images().iter().enumerate() {
                for _ in 0..self.images.failures(index) {
                    if let Some(element) = page.document.element_mut(*node) {
                        handle_image_load_error(element);
                    }
                }
            }
        }

        let metrics = self.layout.measure(&page.document, container);
        if let Some(current) = self.document.as_mut() {
            current.intrinsic_width = outcome.intrinsic_width;
            current.intrinsic_height = metrics.scroll_height;
        }
        self.page = Some(page);
        self.rendered = Some(key);
        self.passes += 1;
        info!(
            "Rendered content pass {} (ratio {:.3}, {} image(s))",
            self.passes,
            self.scale.ratio(),
            image_count
        );

        self.update_size(SizeCause::HtmlReload);

        if self.mode.is_dark_mode {
            let sink = self.sink.clone();
            self.load_debouncer.schedule(move || {
                sink.emit(&ContentEvent::OnLoad);
            });
        } else {
            self.sink.emit(&ContentEvent::OnLoad);
        }

        if image_count == 0 {
            self.on_all_images_loaded();
        }
    }

    /// Report the scaled container height, unless in fullscreen
    pub fn update_size(&mut self, cause: SizeCause) {
        self.sink.emit(&ContentEvent::Debugger(cause.as_str().to_string()));
        if self.fullscreen {
            return;
        }
        let Some(page) = &self.page else {
            return;
        };
        let metrics = self.layout.measure(&page.document, page.container);
        let height = metrics.scroll_height * self.scale.ratio();
        self.sink.emit(&ContentEvent::HeightChange(f64::from(height)));
    }

    fn on_all_images_loaded(&mut self) {
        if !self.all_images_loaded {
            self.all_images_loaded = true;
            self.sink.emit(&ContentEvent::OnLoadFinish);
        }
    }

    fn check_images_complete(&mut self) {
        if self.images.all_complete() {
            self.on_all_images_loaded();
        }
    }

    /// The image at `index` (document order) finished loading
    pub fn on_image_load(&mut self, index: usize) {
        if self.page.is_none() || !self.images.mark_loaded(index) {
            debug!("Load event for unknown image {}", index);
            return;
        }
        self.update_size(SizeCause::ImageLoad);
        self.check_images_complete();
    }

    /// The image at `index` failed to load; fall back to its original URL,
    /// then hide it
    pub fn on_image_error(&mut self, index: usize) -> Option<ImageErrorRecovery> {
        let node = *self.listeners.images().get(index)?;
        let page = self.page.as_mut()?;
        let element = page.document.element_mut(node)?;
        self.images.mark_failed(index);
        let recovery = handle_image_load_error(element);
        debug!("Image {} failed to load: {:?}", index, recovery);
        if recovery == ImageErrorRecovery::Hidden {
            self.update_size(SizeCause::ImageLoad);
        }
        self.check_images_complete();
        Some(recovery)
    }

    /// Tap on `node`: the quoted-text control toggles, links are reported to
    /// the host, embedded objects hide themselves
    pub fn click(&mut self, node: NodeId) -> Interaction {
        let Some(page) = &self.page else {
            return Interaction::Ignored;
        };
        if let Some(control) = page.quoted_control {
            if node == control || page.document.ancestors(node).contains(&control) {
                self.toggle_quoted_text();
                return Interaction::ToggledQuotedText;
            }
        }
        if let Some(anchor) = page.closest(node, "a").filter(|anchor| self.listeners.has_link(*anchor)) {
            let href = page
                .document
                .element(anchor)
                .and_then(|element| element.attr("href"))
                .unwrap_or_default()
                .to_string();
            self.sink.emit(&ContentEvent::ClickLink(href.clone()));
            return Interaction::OpenedLink(href);
        }
        let object = page
            .closest(node, "object")
            .or_else(|| page.closest(node, "embed"))
            .filter(|object| self.listeners.has_object(*object));
        if let Some(object) = object {
            if let Some(element) = self.page.as_mut().and_then(|page| page.document.element_mut(object)) {
                let mut style = element.style();
                style.set("display", "none");
                element.set_style(&style);
                return Interaction::HidObject;
            }
        }
        Interaction::Ignored
    }

    /// Long press on `node`: images ask the host to download their source
    pub fn long_press(&mut self, node: NodeId) -> Option<String> {
        let page = self.page.as_ref()?;
        let image = page.closest(node, "img").filter(|image| self.listeners.has_long_press(*image))?;
        let src = page.document.element(image)?.attr("src")?.to_string();
        self.sink.emit(&ContentEvent::ImageDownload(src.clone()));
        Some(src)
    }

    /// Re-report height for a new viewport. The scale ratio belongs to the
    /// last pass and is only recomputed when the next pass runs.
    pub fn on_viewport_resize(&mut self, viewport: Viewport) {
        self.layout.set_viewport(viewport);
        self.update_size(SizeCause::WindowResize);
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    /// Drop the page and any pending debounced signal
    pub fn teardown(&mut self) {
        self.load_debouncer.cancel();
        self.page = None;
        self.document = None;
        self.rendered = None;
        self.listeners.clear();
        self.images = ImageTracker::default();
        if self.passes > 0 {
            info!("Content pipeline torn down after {} pass(es)", self.passes);
        }
    }

    pub fn document(&self) -> Option<&ContentDocument> {
        self.document.as_ref()
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    pub fn rendered_html(&self) -> Option<String> {
        self.page.as_ref().map(Page::to_html)
    }

    pub fn scale_state(&self) -> ScaleState {
        self.scale
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn image_tracker(&self) -> &ImageTracker {
        &self.images
    }

    pub fn all_images_loaded(&self) -> bool {
        self.all_images_loaded
    }

    pub fn passes(&self) -> usize {
        self.passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::EstimatedLayout;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn pipeline() -> (ContentPipeline, UnboundedReceiver<String>) {
        let config = RenderConfig::default();
        let (sink, rx) = EventSink::channel();
        let layout = EstimatedLayout::new(Viewport::new(375.0, 667.0), 16.0);
        (ContentPipeline::new(&config, Box::new(layout), sink), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<ContentEvent> {
        let mut events = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            events.push(crate::bridge::protocol::parse_message(&raw).unwrap());
        }
        events
    }

    fn payload(markup: &str) -> String {
        SetHtmlPayload::new(markup).to_json().unwrap()
    }

    #[test]
    fn test_pass_runs_only_on_change() {
        let (mut pipeline, mut rx) = pipeline();
        assert!(pipeline.set_html(&payload("<p>Hello</p>")).unwrap());
        assert!(!pipeline.set_html(&payload("<p>Hello</p>")).unwrap());
        assert_eq!(pipeline.passes(), 1);
        assert!(pipeline.set_preview_mode("true"));
        assert!(!pipeline.set_preview_mode("true"));
        assert_eq!(pipeline.passes(), 2);
        let finishes = drain(&mut rx)
            .into_iter()
            .filter(|event| *event == ContentEvent::OnLoadFinish)
            .count();
        assert_eq!(finishes, 1);
    }

    #[test]
    fn test_bad_payload_keeps_previous_document() {
        let (mut pipeline, _rx) = pipeline();
        pipeline.set_html(&payload("<p>Kept</p>")).unwrap();
        let before = pipeline.rendered_html();
        assert!(pipeline.set_html(r#"{"html":"***"}"#).is_err());
        assert!(pipeline.set_html("{not json").is_err());
        assert_eq!(pipeline.rendered_html(), before);
        assert!(pipeline.document().unwrap().show_html.contains("Kept"));
    }

    #[test]
    fn test_empty_markup_is_ignored() {
        let (mut pipeline, mut rx) = pipeline();
        assert!(!pipeline.set_html(r#"{"html":""}"#).unwrap());
        assert!(pipeline.document().is_none());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_link_click_and_object_hide() {
        let (mut pipeline, mut rx) = pipeline();
        pipeline
            .set_html(&payload(r#"<a href="https://example.com/a"><span>go</span></a><object data="x.swf"></object>"#))
            .unwrap();
        drain(&mut rx);
        let page = pipeline.page().unwrap();
        let span = page.document.elements_by_tag(page.content, "span")[0];
        let object = page.document.elements_by_tag(page.content, "object")[0];
        assert_eq!(
            pipeline.click(span),
            Interaction::OpenedLink("https://example.com/a".to_string())
        );
        assert_eq!(
            drain(&mut rx),
            vec![ContentEvent::ClickLink("https://example.com/a".to_string())]
        );
        assert_eq!(pipeline.click(object), Interaction::HidObject);
        assert!(pipeline.rendered_html().unwrap().contains(r#"<object data="x.swf" style="display: none;">"#));
    }

    #[test]
    fn test_long_press_download_depends_on_platform() {
        let (mut pipeline, mut rx) = pipeline();
        pipeline.set_html(&payload(r#"<img src="https://example.com/i.png">"#)).unwrap();
        drain(&mut rx);
        let image = pipeline.listeners().images()[0];
        assert_eq!(pipeline.long_press(image).as_deref(), Some("https://example.com/i.png"));
        assert_eq!(
            drain(&mut rx),
            vec![ContentEvent::ImageDownload("https://example.com/i.png".to_string())]
        );

        let ios = SetHtmlPayload::new(r#"<img src="https://example.com/j.png">"#)
            .platform(Platform::Ios)
            .to_json()
            .unwrap();
        pipeline.set_html(&ios).unwrap();
        let image = pipeline.listeners().images()[0];
        assert_eq!(pipeline.long_press(image), None);
    }

    #[test]
    fn test_fullscreen_suppresses_height_but_not_trace() {
        let (mut pipeline, mut rx) = pipeline();
        pipeline.set_html(&payload("<p>Body</p>")).unwrap();
        drain(&mut rx);
        pipeline.set_fullscreen(true);
        pipeline.on_viewport_resize(Viewport::new(414.0, 896.0));
        assert_eq!(drain(&mut rx), vec![ContentEvent::Debugger("window-resize".to_string())]);
        pipeline.set_fullscreen(false);
        pipeline.on_viewport_resize(Viewport::new(375.0, 667.0));
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ContentEvent::HeightChange(_)));
    }

    #[test]
    fn test_resize_keeps_ratio_until_next_pass() {
        let (mut pipeline, mut rx) = pipeline();
        pipeline
            .set_html(&payload(r#"<table width="750"><tr><td>Wide</td></tr></table>"#))
            .unwrap();
        let first = drain(&mut rx);
        assert!((pipeline.scale_state().ratio() - 0.5).abs() < 1e-3);

        pipeline.on_viewport_resize(Viewport::new(750.0, 667.0));
        assert!((pipeline.scale_state().ratio() - 0.5).abs() < 1e-3);
        let resized = drain(&mut rx);
        let height = |events: &[ContentEvent]| {
            events.iter().find_map(|event| match event {
                ContentEvent::HeightChange(height) => Some(*height),
                _ => None,
            })
        };
        assert_eq!(height(&resized), height(&first));

        assert!(pipeline.set_preview_mode("true"));
        assert!(pipeline.scale_state().is_identity());
    }

    #[test]
    fn test_dark_mode_toggle_rerenders_from_markup() {
        let (mut pipeline, _rx) = pipeline();
        let markup = r#"<div style="background-color: #ffffff">x</div>"#;
        pipeline
            .set_html(&SetHtmlPayload::new(markup).dark_mode(true).to_json().unwrap())
            .unwrap();
        assert!(pipeline.page().unwrap().content_html().contains("#121212"));
        pipeline.set_html(&payload(markup)).unwrap();
        assert_eq!(pipeline.page().unwrap().content_html(), markup);
    }
}
