//! Removal of decoy hidden content
//!
//! Marketing mail pads bodies with invisible preheaders and spam-filter bait:
//! `display: none` spans, zero-height overflow boxes, 1px white text and
//! blocks parked far off-screen. Left in place they skew layout measurement
//! and text extraction, so they are detached.
//!
//! Responsive mail hides mobile-only blocks inline and shows them again from
//! an `@media` rule, so a `display: none` element whose class or id appears in
//! one of the message's stylesheets is left alone.

use super::{for_each_node, StageReport};
use crate::config::HiddenContentSettings;
use crate::dom::style::parse_length_px;
use crate::dom::{Document, Element, InlineStyle, NodeId};
use crate::error::MailframeError;
use tracing::trace;

const OFFSCREEN_OFFSET: f32 = -999.0;

/// Why an element counts as a decoy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenReason {
    DisplayNone,
    ZeroSize,
    InvisibleText,
    Offscreen,
}

pub struct HiddenContentStripper {
    settings: HiddenContentSettings,
}

impl Default for HiddenContentStripper {
    fn default() -> Self {
        Self::new(HiddenContentSettings::default())
    }
}

impl HiddenContentStripper {
    pub fn new(settings: HiddenContentSettings) -> Self {
        Self { settings }
    }

    pub fn apply(&self, document: &mut Document, container: NodeId) -> StageReport {
        if !self.settings.enabled {
            return StageReport::default();
        }
        let stylesheet = stylesheet_text(document, container);
        let nodes = document.descendant_elements(container);
        for_each_node("hidden-content", nodes, |node| {
            // Already gone with a stripped ancestor
            if !document.is_connected(node) {
                return Ok(false);
            }
            let element = document
                .element(node)
                .ok_or_else(|| MailframeError::malformed("hidden-content node is not an element"))?;
            match self.classify(document, node, element, &stylesheet) {
                Some(reason) => {
                    trace!("Stripping hidden <{}> ({:?})", element.name, reason);
                    document.detach(node);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// `stylesheet` is the text of every `<style>` block in the message
    pub fn classify(
        &self,
        document: &Document,
        node: NodeId,
        element: &Element,
        stylesheet: &str,
    ) -> Option<HiddenReason> {
        if matches!(element.name.as_str(), "style" | "head" | "meta" | "link" | "title") {
            return None;
        }
        let style = element.style();
        if style.is_empty() {
            return None;
        }
        if self.settings.strip_display_none
            && is_display_none(&style)
            && !is_styled_by(element, stylesheet)
        {
            return Some(HiddenReason::DisplayNone);
        }
        if self.settings.strip_zero_size {
            if is_collapsed_box(&style) {
                return Some(HiddenReason::ZeroSize);
            }
            if is_invisible_text(&style) && !has_sized_descendant(document, node) {
                return Some(HiddenReason::InvisibleText);
            }
        }
        if self.settings.strip_offscreen && is_offscreen(&style) {
            return Some(HiddenReason::Offscreen);
        }
        None
    }
}

fn px(style: &InlineStyle, property: &str) -> Option<f32> {
    style.get(property).and_then(|value| parse_length_px(value, 16.0))
}

fn stylesheet_text(document: &Document, container: NodeId) -> String {
    let mut text = String::new();
    for style in document.elements_by_tag(container, "style") {
        for child in document.children(style) {
            if let Some(css) = document.text(*child) {
                text.push_str(css);
                text.push('\n');
            }
        }
    }
    text
}

/// Whether a `.class` or `#id` selector of the element occurs in `stylesheet`
fn is_styled_by(element: &Element, stylesheet: &str) -> bool {
    if stylesheet.is_empty() {
        return false;
    }
    let classes = element
        .attr("class")
        .into_iter()
        .flat_map(str::split_ascii_whitespace)
        .map(|class| format!(".{}", class));
    let id = element.id().map(|id| format!("#{}", id.trim()));
    classes
        .chain(id)
        .any(|selector| has_selector(stylesheet, &selector))
}

fn has_selector(stylesheet: &str, selector: &str) -> bool {
    if selector.len() < 2 {
        return false;
    }
    stylesheet.match_indices(selector).any(|(start, _)| {
        stylesheet[start + selector.len()..]
            .chars()
            .next()
            .map(|next| !(next.is_alphanumeric() || next == '-' || next == '_'))
            .unwrap_or(true)
    })
}

fn is_display_none(style: &InlineStyle) -> bool {
    let display_none = style
        .get("display")
        .map(|value| value.trim().eq_ignore_ascii_case("none"))
        .unwrap_or(false);
    let mso_hidden = style
        .get("mso-hide")
        .map(|value| value.trim().eq_ignore_ascii_case("all"))
        .unwrap_or(false);
    display_none || mso_hidden
}

/// Zero width or height (or max-height) with the overflow clipped
fn is_collapsed_box(style: &InlineStyle) -> bool {
    let clipped = style
        .get("overflow")
        .map(|value| value.trim().eq_ignore_ascii_case("hidden"))
        .unwrap_or(false);
    let zero = |property: &str| px(style, property).map(|value| value <= 0.0).unwrap_or(false);
    clipped && (zero("width") || zero("height") || zero("max-height") || zero("max-width"))
}

/// Text too small or too transparent to read
fn is_invisible_text(style: &InlineStyle) -> bool {
    let tiny_font = px(style, "font-size").map(|size| size <= 1.0).unwrap_or(false);
    let transparent = style
        .get("opacity")
        .and_then(|value| value.trim().parse::<f32>().ok())
        .map(|opacity| opacity <= 0.0)
        .unwrap_or(false);
    tiny_font || transparent
}

/// A child restoring a readable font size (the `font-size: 0` inline-block trick)
fn has_sized_descendant(document: &Document, node: NodeId) -> bool {
    document.descendant_elements(node).into_iter().any(|child| {
        document
            .element(child)
            .map(|element| {
                element.is("img")
                    || px(&element.style(), "font-size")
                        .map(|size| size > 1.0)
                        .unwrap_or(false)
            })
            .unwrap_or(false)
    })
}

fn is_offscreen(style: &InlineStyle) -> bool {
    let positioned = style
        .get("position")
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "absolute" | "fixed"))
        .unwrap_or(false);
    let far = |property: &str| px(style, property).map(|value| value <= OFFSCREEN_OFFSET).unwrap_or(false);
    (positioned && (far("left") || far("top"))) || far("text-indent")
}
