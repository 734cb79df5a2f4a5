//! Rendered page skeleton around one email body

use super::state::RenderMode;
use crate::config::RenderConfig;
use crate::dom::{Document, Element, NodeId};

pub const BODY_CLASS: &str = "mailframe";
pub const CONTAINER_ID: &str = "mailframe-container";
pub const CONTENT_CLASS: &str = "mailframe-content";
pub const QUOTED_CONTROL_CLASS: &str = "mailframe-quoted-control";
pub const TOGGLE_QUOTED_ACTION: &str = "toggle-quoted-text";

/// Colors and spacing the skeleton is drawn with
#[derive(Debug, Clone, PartialEq)]
pub struct PageTheme {
    pub dark_background: String,
    pub dark_text: String,
    pub light_background: String,
    pub preview_padding: String,
}

impl PageTheme {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            dark_background: config.dark_mode.background.clone(),
            dark_text: config.dark_mode.text.clone(),
            light_background: "#fffffe".to_string(),
            preview_padding: config.layout.preview_padding.clone(),
        }
    }

    fn stylesheet(&self, dark: bool) -> String {
        if dark {
            format!(
                "html, body.{BODY_CLASS}, #{CONTAINER_ID} {{ background-color: {} !important; }} body {{ color: {}; }}",
                self.dark_background, self.dark_text
            )
        } else {
            format!(
                "html, body.{BODY_CLASS}, #{CONTAINER_ID} {{ background-color: {} !important; }}",
                self.light_background
            )
        }
    }
}

impl Default for PageTheme {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// `body > #container > [style, frame > [content, quoted control?]]`
#[derive(Debug, Clone)]
pub struct Page {
    pub document: Document,
    pub body: NodeId,
    pub container: NodeId,
    pub frame: NodeId,
    pub content: NodeId,
    pub quoted_control: Option<NodeId>,
}

impl Page {
    pub fn render(
        show_html: &str,
        mode: &RenderMode,
        has_img_or_video: bool,
        with_quoted_control: bool,
        theme: &PageTheme,
    ) -> Self {
        let mut document = Document::new();
        let root = document.root();

        let body = document.create_element(Element::new("body").with_attr("class", BODY_CLASS));
        document.append_child(root, body);
        let container = document.create_element(Element::new("div").with_attr("id", CONTAINER_ID));
        document.append_child(body, container);

        let style = document.create_element(Element::new("style"));
        document.append_child(container, style);
        let css = document.create_text(&theme.stylesheet(mode.is_dark_mode));
        document.append_child(style, css);

        let mut frame_element = Element::new("div");
        if mode.is_preview_mode && !has_img_or_video {
            frame_element.set_attr("style", format!("padding: {};", theme.preview_padding));
        }
        let frame = document.create_element(frame_element);
        document.append_child(container, frame);

        let content = document.create_element(Element::new("div").with_attr("class", CONTENT_CLASS));
        document.append_child(frame, content);
        let fragment = Document::parse_fragment(show_html);
        document.import(content, &fragment, fragment.root());

        let quoted_control = with_quoted_control.then(|| {
            let label = if mode.show_quoted_text {
                "Hide quoted text"
            } else {
                "Show quoted text"
            };
            let control = document.create_element(
                Element::new("div")
                    .with_attr("class", QUOTED_CONTROL_CLASS)
                    .with_attr("data-action", TOGGLE_QUOTED_ACTION)
                    .with_attr("role", "button")
                    .with_attr("aria-label", label),
            );
            let dots = document.create_text("\u{2022}\u{2022}\u{2022}");
            document.append_child(control, dots);
            document.append_child(frame, control);
            control
        });

        Self {
            document,
            body,
            container,
            frame,
            content,
            quoted_control,
        }
    }

    /// The nearest element named `tag` at or above `node`, inside the container
    pub fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        std::iter::once(node)
            .chain(self.document.ancestors(node))
            .take_while(|candidate| *candidate != self.container)
            .find(|candidate| self.document.is_element(*candidate, tag))
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.document.ancestors(node).contains(&self.container)
    }

    pub fn to_html(&self) -> String {
        self.document.outer_html(self.body)
    }

    pub fn content_html(&self) -> String {
        self.document.inner_html(self.content)
    }
}
