//! Adaptive width scaling
//!
//! Desktop-formatted mail is laid out for 600px or more. When the rendered
//! container is wider than the viewport, the whole container is shrunk with a
//! CSS transform and every font size is counter-scaled so text keeps its
//! on-screen size.

use super::{for_each_node, StageReport};
use crate::dom::style::{format_px, parse_length_px};
use crate::dom::{Document, NodeId, NodeKind};
use crate::error::MailframeError;
use crate::layout::{font_size_attr_px, LayoutProbe};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

static STYLESHEET_FONT_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(font-size\s*:\s*)(\d+(?:\.\d+)?|\.\d+)(px|pt)").unwrap()
});

/// Uniform shrink factor of one rendered document, in (0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleState {
    ratio: f32,
}

impl Default for ScaleState {
    fn default() -> Self {
        Self::identity()
    }
}

impl ScaleState {
    pub fn identity() -> Self {
        Self { ratio: 1.0 }
    }

    /// `min(1, viewport / intrinsic)`; degenerate widths scale nothing
    pub fn compute(viewport_width: f32, intrinsic_width: f32) -> Self {
        if !viewport_width.is_finite()
            || !intrinsic_width.is_finite()
            || viewport_width <= 0.0
            || intrinsic_width <= viewport_width
        {
            return Self::identity();
        }
        Self {
            ratio: viewport_width / intrinsic_width,
        }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn is_identity(&self) -> bool {
        self.ratio >= 1.0
    }

    /// Factor applied to font sizes so `size * counter * ratio == size`
    pub fn counter_scale(&self) -> f32 {
        1.0 / self.ratio
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleOutcome {
    pub state: ScaleState,
    pub intrinsic_width: f32,
    /// Untransformed layout height of the container, in CSS px
    pub layout_height: f32,
    pub stylesheets: StageReport,
    pub inline_fonts: StageReport,
    pub residual: StageReport,
}

impl ScaleOutcome {
    /// Height of the visually scaled container
    pub fn scaled_height(&self) -> f32 {
        self.layout_height * self.state.ratio()
    }
}

pub struct ScalingEngine {
    overflow_slack: f32,
    default_font_size: f32,
}

impl ScalingEngine {
    pub fn new(overflow_slack: f32, default_font_size: f32) -> Self {
        Self {
            overflow_slack,
            default_font_size,
        }
    }

    pub fn apply(
        &self,
        document: &mut Document,
        body: NodeId,
        container: NodeId,
        layout: &dyn LayoutProbe,
    ) -> ScaleOutcome {
        if let Some(element) = document.element_mut(body) {
            let mut style = element.style();
            style.set("min-width", "initial");
            style.set("width", "initial");
            element.set_style(&style);
        }

        let metrics = layout.measure(document, container);
        let state = ScaleState::compute(layout.viewport().width, metrics.scroll_width);
        let mut outcome = ScaleOutcome {
            state,
            intrinsic_width: metrics.scroll_width,
            layout_height: metrics.offset_height,
            ..ScaleOutcome::default()
        };
        if state.is_identity() {
            return outcome;
        }
        debug!(
            "Scaling content {}px -> {}px (ratio {:.3})",
            metrics.scroll_width,
            layout.viewport().width,
            state.ratio()
        );

        if let Some(element) = document.element_mut(container) {
            let mut style = element.style();
            style.set("width", format_px(metrics.scroll_width));
            style.set("transform", format!("scale({})", state.ratio()));
            style.set("transform-origin", "0 0");
            element.set_style(&style);
        }

        outcome.stylesheets = self.zoom_stylesheets(document, state);
        outcome.inline_fonts = self.zoom_inline_fonts(document, container, state);
        outcome.residual = self.scale_down_overflowing_cells(document, container, layout);
        outcome.layout_height = layout.measure(document, container).offset_height;

        if let Some(element) = document.element_mut(body) {
            let mut style = element.style();
            style.set("height", format_px(outcome.scaled_height()));
            element.set_style(&style);
        }
        outcome
    }

    /// Counter-scale `font-size` px/pt rules inside every `<style>` element
    fn zoom_stylesheets(&self, document: &mut Document, state: ScaleState) -> StageReport {
        let root = document.root();
        let sheets = document.elements_by_tag(root, "style");
        let factor = state.counter_scale();
        for_each_node("scale-stylesheets", sheets, |sheet| {
            let texts: Vec<NodeId> = document
                .children(sheet)
                .iter()
                .copied()
                .filter(|child| matches!(document.kind(*child), Some(NodeKind::Text(_))))
                .collect();
            let mut changed = false;
            for text in texts {
                let source = document
                    .text(text)
                    .ok_or_else(|| MailframeError::malformed("stylesheet text vanished"))?
                    .to_string();
                let zoomed = STYLESHEET_FONT_SIZE.replace_all(&source, |caps: &Captures| {
                    let value: f32 = caps[2].parse().unwrap_or(0.0);
                    let px = if caps[3].eq_ignore_ascii_case("pt") {
                        value * 4.0 / 3.0
                    } else {
                        value
                    };
                    format!("{}{}", &caps[1], format_px(px * factor))
                });
                if zoomed != source {
                    document.set_text(text, zoomed.into_owned());
                    changed = true;
                }
            }
            Ok(changed)
        })
    }

    /// Counter-scale absolute inline font sizes and `<font size>` attributes
    fn zoom_inline_fonts(&self, document: &mut Document, container: NodeId, state: ScaleState) -> StageReport {
        let nodes: Vec<NodeId> = document
            .descendant_elements(container)
            .into_iter()
            .filter(|node| {
                document
                    .element(*node)
                    .map(|element| element.has_attr("style") || (element.is("font") && element.has_attr("size")))
                    .unwrap_or(false)
            })
            .collect();
        let factor = state.counter_scale();
        for_each_node("scale-inline-fonts", nodes, |node| {
            let element = document
                .element_mut(node)
                .ok_or_else(|| MailframeError::malformed("font node is not an element"))?;
            let mut style = element.style();
            let current = match style.get("font-size") {
                Some(value) => absolute_font_size(value),
                None if element.is("font") => element.attr("size").and_then(font_size_attr_px),
                None => None,
            };
            let Some(size) = current else {
                return Ok(false);
            };
            style.set("font-size", format_px(size * factor));
            element.set_style(&style);
            Ok(true)
        })
    }

    /// Shrink table-cell text when the container still overflows after the
    /// uniform scale, by the container's residual overflow ratio
    fn scale_down_overflowing_cells(
        &self,
        document: &mut Document,
        container: NodeId,
        layout: &dyn LayoutProbe,
    ) -> StageReport {
        let metrics = layout.measure(document, container);
        if metrics.scroll_width <= metrics.offset_width + self.overflow_slack {
            return StageReport::default();
        }
        let ratio = ((metrics.offset_width - self.overflow_slack) / metrics.scroll_width).max(0.1);
        let candidates: Vec<NodeId> = document
            .descendant_elements(container)
            .into_iter()
            .filter(|node| is_residual_candidate(document, *node))
            .collect();
        let default_font_size = self.default_font_size;
        for_each_node("scale-residual", candidates, |node| {
            let element = document
                .element_mut(node)
                .ok_or_else(|| MailframeError::malformed("cell text is not an element"))?;
            let mut style = element.style();
            let size = style
                .get("font-size")
                .and_then(|value| parse_length_px(value, default_font_size))
                .or_else(|| element.attr("size").and_then(font_size_attr_px))
                .unwrap_or(default_font_size);
            style.set("font-size", format_px(size * ratio));
            element.set_style(&style);
            Ok(true)
        })
    }
}

/// Font sizes that do not already follow their parent (`em`, `%`, keywords)
fn absolute_font_size(value: &str) -> Option<f32> {
    let lowered = value.trim().to_ascii_lowercase();
    if lowered.ends_with("em") || lowered.ends_with('%') {
        return None;
    }
    parse_length_px(&lowered, 0.0).filter(|size| *size > 0.0)
}

/// `td > a[style]`, `td > span[style]`, `td > font[size]`
fn is_residual_candidate(document: &Document, node: NodeId) -> bool {
    let Some(element) = document.element(node) else {
        return false;
    };
    let parent_is_cell = document
        .parent(node)
        .map(|parent| document.is_element(parent, "td"))
        .unwrap_or(false);
    parent_is_cell
        && match element.name.as_str() {
            "a" | "span" => element.has_attr("style"),
            "font" => element.has_attr("size"),
            _ => false,
        }
}
