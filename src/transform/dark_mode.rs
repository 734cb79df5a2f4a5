//! Dark mode color rewriting
//!
//! Walks elements children-first and flips only explicit colors picked for a
//! light page: light backgrounds and borders become dark, dark text becomes
//! light. Transparent colors and elements carrying background artwork are
//! left alone.

use super::{for_each_node, StageReport};
use crate::color::{ColorClassifier, Rgba};
use crate::dom::{Document, Element, InlineStyle, NodeId};
use crate::error::{MailframeError, Result};

const SKIPPED_TAGS: &[&str] = &[
    "img", "video", "picture", "svg", "canvas", "iframe", "object", "embed", "style", "script",
    "br", "meta", "link",
];

const BORDER_PROPERTIES: &[&str] = &[
    "border",
    "border-color",
    "border-top",
    "border-right",
    "border-bottom",
    "border-left",
    "border-top-color",
    "border-right-color",
    "border-bottom-color",
    "border-left-color",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wanted {
    Dark,
    Light,
}

pub struct DarkModeEngine {
    classifier: ColorClassifier,
}

impl DarkModeEngine {
    pub fn new(classifier: ColorClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ColorClassifier {
        &self.classifier
    }

    /// Rewrite every element below `container`, deepest nodes first
    pub fn apply(&self, document: &mut Document, container: NodeId) -> StageReport {
        let mut nodes = document.descendant_elements(container);
        nodes.reverse();
        for_each_node("dark-mode", nodes, |node| self.apply_to_node(document, node))
    }

    pub fn apply_to_node(&self, document: &mut Document, node: NodeId) -> Result<bool> {
        let element = document
            .element_mut(node)
            .ok_or_else(|| MailframeError::malformed(format!("node {} is not an element", node.index())))?;
        if SKIPPED_TAGS.contains(&element.name.as_str()) || carries_artwork(element) {
            return Ok(false);
        }

        let mut style = element.style();
        let mut changed = false;

        changed |= self.rewrite_property(&mut style, "background-color", Wanted::Dark);
        changed |= self.rewrite_property(&mut style, "background", Wanted::Dark);
        changed |= self.rewrite_property(&mut style, "color", Wanted::Light);
        for property in BORDER_PROPERTIES {
            changed |= self.rewrite_property(&mut style, property, Wanted::Dark);
        }
        if changed {
            element.set_style(&style);
        }

        changed |= self.rewrite_attribute(element, "bgcolor", Wanted::Dark);
        changed |= self.rewrite_attribute(element, "bordercolor", Wanted::Dark);
        if element.is("font") {
            changed |= self.rewrite_attribute(element, "color", Wanted::Light);
        }
        Ok(changed)
    }

    fn convert(&self, color: &Rgba, wanted: Wanted) -> Option<Rgba> {
        if !color.is_opaque() {
            return None;
        }
        match (wanted, self.classifier.is_light(color)) {
            (Wanted::Dark, true) => Some(self.classifier.darken(color)),
            (Wanted::Light, false) => Some(self.classifier.lighten(color)),
            _ => None,
        }
    }

    /// Rewrite color tokens of one declaration; shorthands keep their other parts
    fn rewrite_property(&self, style: &mut InlineStyle, property: &str, wanted: Wanted) -> bool {
        let Some(value) = style.get(property) else {
            return false;
        };
        let mut changed = false;
        let rewritten: Vec<String> = split_tokens(value)
            .into_iter()
            .map(|token| match Rgba::parse(token).and_then(|c| self.convert(&c, wanted)) {
                Some(converted) => {
                    changed = true;
                    converted.to_css()
                }
                None => token.to_string(),
            })
            .collect();
        if changed {
            style.set(property, rewritten.join(" "));
        }
        changed
    }

    fn rewrite_attribute(&self, element: &mut Element, attr: &str, wanted: Wanted) -> bool {
        let converted = element
            .attr(attr)
            .and_then(Rgba::parse)
            .and_then(|color| self.convert(&color, wanted));
        match converted {
            Some(color) => {
                element.set_attr(attr, color.to_css());
                true
            }
            None => false,
        }
    }
}

/// Elements painting an image behind their content (logos, banners)
fn carries_artwork(element: &Element) -> bool {
    if element.has_attr("background") {
        return true;
    }
    let style = element.style();
    ["background-image", "background"]
        .iter()
        .filter_map(|property| style.get(property))
        .any(|value| {
            let value = value.to_ascii_lowercase();
            value.contains("url(") || value.contains("gradient(")
        })
}

/// Whitespace-separated tokens, keeping `rgb(...)` groups whole
fn split_tokens(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    for (index, ch) in value.char_indices() {
        match ch {
            '(' => {
                depth += 1;
                start.get_or_insert(index);
            }
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(begin) = start.take() {
                    tokens.push(&value[begin..index]);
                }
            }
            _ => {
                start.get_or_insert(index);
            }
        }
    }
    if let Some(begin) = start {
        tokens.push(&value[begin..]);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DarkModeEngine {
        DarkModeEngine::new(ColorClassifier::default())
    }

    fn render(html: &str) -> String {
        let mut doc = Document::parse_fragment(html);
        let root = doc.root();
        engine().apply(&mut doc, root);
        doc.to_html()
    }

    #[test]
    fn test_light_background_becomes_dark() {
        let html = render(r#"<div style="background-color: #ffffff; color: #000">Hi</div>"#);
        assert_eq!(
            html,
            r#"<div style="background-color: #121212; color: #ffffff;">Hi</div>"#
        );
    }

    #[test]
    fn test_bgcolor_and_font_color_attributes() {
        let html = render(r##"<table bgcolor="#FFFFFF"><tr><td><font color="black">x</font></td></tr></table>"##);
        assert!(html.contains(r##"bgcolor="#121212""##));
        assert!(html.contains(r##"color="#ffffff""##));
    }

    #[test]
    fn test_shorthands_keep_other_parts() {
        let html = render(r#"<td style="border: 1px solid #eeeeee; background: #fafafa no-repeat">x</td>"#);
        assert!(html.contains("border: 1px solid #"));
        assert!(!html.contains("#eeeeee"));
        assert!(html.contains("no-repeat"));
        assert!(!html.contains("#fafafa"));
    }

    #[test]
    fn test_transparent_and_artwork_untouched() {
        let transparent = r#"<div style="background-color: rgba(255, 255, 255, 0.5);">x</div>"#;
        assert_eq!(render(transparent), transparent);
        let banner = r#"<div style="background: #fff url(banner.png); color: #000;">x</div>"#;
        assert_eq!(render(banner), banner);
        let image = r#"<img src="logo.png" style="background-color: #fff;">"#;
        assert_eq!(render(image), image);
    }

    #[test]
    fn test_dark_backgrounds_and_light_text_kept() {
        let html = r#"<div style="background-color: #222; color: #eee;">x</div>"#;
        assert_eq!(render(html), html);
    }

    #[test]
    fn test_rewritten_backgrounds_classify_dark() {
        let engine = engine();
        let mut doc = Document::parse_fragment(
            r#"<div style="background-color: #f5f5dc">a</div><p style="background-color: rgb(200, 230, 255)">b</p><span style="background-color: yellow">c</span>"#,
        );
        let root = doc.root();
        let report = engine.apply(&mut doc, root);
        assert_eq!(report.changed, 3);
        for node in doc.descendant_elements(root) {
            let style = doc.element(node).unwrap().style();
            let color = Rgba::parse(style.get("background-color").unwrap()).unwrap();
            assert!(!engine.classifier().is_light(&color));
        }
    }
}
