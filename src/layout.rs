//! Geometry probing for the scaling and oversize stages
//!
//! A real host hands the pipeline a probe backed by its rendering engine.
//! [`EstimatedLayout`] is the built-in stand-in: a deliberately small model of
//! block/inline/table flow that is good enough to tell a 600px desktop
//! newsletter from a mobile-friendly body.

use crate::dom::style::parse_length_px;
use crate::dom::{Document, Element, NodeId, NodeKind};

/// Box measurements of one element, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxMetrics {
    pub scroll_width: f32,
    pub scroll_height: f32,
    pub offset_width: f32,
    pub offset_height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Source of layout measurements for a rendered document
pub trait LayoutProbe: Send {
    fn viewport(&self) -> Viewport;

    fn set_viewport(&mut self, viewport: Viewport);

    fn measure(&self, document: &Document, node: NodeId) -> BoxMetrics;
}

const CHAR_WIDTH_RATIO: f32 = 0.55;
const LINE_HEIGHT_RATIO: f32 = 1.2;

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "big", "cite", "code", "em", "font", "i", "label", "mark", "q", "s",
    "small", "span", "strike", "strong", "sub", "sup", "tt", "u", "wbr",
];

/// Deeper subtrees are measured as a flat run of their text
const MAX_NESTING: usize = 256;

const SKIPPED_TAGS: &[&str] = &[
    "head", "link", "meta", "noscript", "script", "style", "template", "title",
];

/// Legacy `<font size>` steps, in px
const FONT_SIZE_STEPS: [f32; 7] = [10.0, 13.0, 16.0, 18.0, 24.0, 32.0, 48.0];

/// Resolve a `<font size="...">` value (absolute `1`..`7` or relative `+n`/`-n`)
pub fn font_size_attr_px(value: &str) -> Option<f32> {
    let value = value.trim();
    let step: i32 = if let Some(relative) = value.strip_prefix('+') {
        3i32.saturating_add(relative.parse::<i32>().ok()?)
    } else if value.starts_with('-') {
        3i32.saturating_add(value.parse::<i32>().ok()?)
    } else {
        value.parse::<i32>().ok()?
    };
    let index = (step.clamp(1, 7) - 1) as usize;
    Some(FONT_SIZE_STEPS[index])
}

#[derive(Debug, Clone, Copy, Default)]
struct Estimate {
    min_width: f32,
    height: f32,
}

#[derive(Debug, Default)]
struct InlineRun {
    advance: f32,
    line_height: f32,
    min_width: f32,
}

/// Block estimate plus the inline run still being filled
#[derive(Debug, Default)]
struct Flow {
    estimate: Estimate,
    run: InlineRun,
}

/// Heuristic layout model used when no rendering engine is attached
#[derive(Debug, Clone)]
pub struct EstimatedLayout {
    viewport: Viewport,
    default_font_size: f32,
}

impl EstimatedLayout {
    pub fn new(viewport: Viewport, default_font_size: f32) -> Self {
        Self {
            viewport,
            default_font_size,
        }
    }

    fn font_size(&self, element: &Element, inherited: f32) -> f32 {
        if let Some(size) = element
            .style()
            .get("font-size")
            .and_then(|value| parse_length_px(value, inherited))
        {
            return size;
        }
        if element.is("font") {
            if let Some(size) = element.attr("size").and_then(font_size_attr_px) {
                return size;
            }
        }
        match element.name.as_str() {
            "h1" => inherited * 2.0,
            "h2" => inherited * 1.5,
            "h3" => inherited * 1.17,
            "small" => inherited * 0.83,
            _ => inherited,
        }
    }

    /// Explicit width from the `width` attribute or inline style, if absolute
    fn explicit_width(element: &Element, font_size: f32) -> Option<f32> {
        let style = element.style();
        let styled = ["width", "min-width"]
            .iter()
            .filter_map(|name| style.get(name))
            .filter_map(|value| parse_length_px(value, font_size))
            .fold(None, |acc: Option<f32>, value| Some(acc.map_or(value, |a| a.max(value))));
        styled.or_else(|| {
            element
                .attr("width")
                .and_then(|value| parse_length_px(value, font_size))
        })
    }

    fn explicit_height(element: &Element, font_size: f32) -> Option<f32> {
        element
            .style()
            .get("height")
            .and_then(|value| parse_length_px(value, font_size))
            .or_else(|| {
                element
                    .attr("height")
                    .and_then(|value| parse_length_px(value, font_size))
            })
    }

    fn is_hidden(element: &Element) -> bool {
        element
            .style()
            .get("display")
            .map(|display| display.trim().eq_ignore_ascii_case("none"))
            .unwrap_or(false)
    }

    fn estimate(&self, doc: &Document, node: NodeId, available: f32, font_size: f32, depth: usize) -> Estimate {
        let Some(element) = doc.element(node) else {
            return self.estimate_children(doc, node, available, font_size, depth);
        };
        if SKIPPED_TAGS.contains(&element.name.as_str()) || Self::is_hidden(element) {
            return Estimate::default();
        }
        let font_size = self.font_size(element, font_size);
        if element.is("img") || element.is("video") {
            return self.estimate_replaced(element, available, font_size);
        }
        let explicit_width = Self::explicit_width(element, font_size);
        let explicit_height = Self::explicit_height(element, font_size);

        let available = explicit_width.unwrap_or(available);
        let content = if depth >= MAX_NESTING {
            self.estimate_flattened(doc, node, available, font_size)
        } else if element.is("table") {
            self.estimate_table(doc, node, available, font_size, depth + 1)
        } else {
            self.estimate_children(doc, node, available, font_size, depth + 1)
        };

        Estimate {
            min_width: content.min_width.max(explicit_width.unwrap_or(0.0)),
            height: content.height.max(explicit_height.unwrap_or(0.0)),
        }
    }

    fn estimate_replaced(&self, element: &Element, available: f32, font_size: f32) -> Estimate {
        let mut width = Self::explicit_width(element, font_size).unwrap_or(0.0);
        let mut height = Self::explicit_height(element, font_size).unwrap_or(0.0);
        let bounded = element
            .style()
            .get("max-width")
            .map(|value| value.trim() == "100%")
            .unwrap_or(false);
        if bounded && width > available && width > 0.0 {
            height *= available / width;
            width = available;
        }
        Estimate {
            min_width: width,
            height,
        }
    }

    fn estimate_table(
        &self,
        doc: &Document,
        table: NodeId,
        available: f32,
        font_size: f32,
        depth: usize,
    ) -> Estimate {
        let mut rows = Vec::new();
        for child in doc.element_children(table) {
            match doc.tag_name(child) {
                Some("tr") => rows.push(child),
                Some("tbody") | Some("thead") | Some("tfoot") => rows.extend(
                    doc.element_children(child)
                        .into_iter()
                        .filter(|row| doc.is_element(*row, "tr")),
                ),
                _ => {}
            }
        }

        let mut estimate = Estimate::default();
        for row in rows {
            let cells: Vec<NodeId> = doc
                .element_children(row)
                .into_iter()
                .filter(|cell| doc.is_element(*cell, "td") || doc.is_element(*cell, "th"))
                .collect();
            if cells.is_empty() {
                continue;
            }
            let share = available / cells.len() as f32;
            let mut row_width = 0.0;
            let mut row_height: f32 = 0.0;
            for cell in cells {
                let cell_estimate = self.estimate(doc, cell, share, font_size, depth);
                let cell_available = cell_estimate.min_width.max(share);
                let cell_estimate = if cell_available > share {
                    self.estimate(doc, cell, cell_available, font_size, depth)
                } else {
                    cell_estimate
                };
                row_width += cell_estimate.min_width;
                row_height = row_height.max(cell_estimate.height);
            }
            estimate.min_width = estimate.min_width.max(row_width);
            estimate.height += row_height;
        }
        estimate
    }

    fn estimate_children(
        &self,
        doc: &Document,
        node: NodeId,
        available: f32,
        font_size: f32,
        depth: usize,
    ) -> Estimate {
        let mut flow = Flow::default();
        self.walk_children(doc, node, available, font_size, depth, &mut flow);
        Self::flush_run(&mut flow.estimate, &mut flow.run, available);
        flow.estimate
    }

    fn estimate_flattened(&self, doc: &Document, node: NodeId, available: f32, font_size: f32) -> Estimate {
        let mut estimate = Estimate::default();
        let mut run = InlineRun::default();
        Self::add_text(&mut run, &doc.text_content(node), font_size);
        Self::flush_run(&mut estimate, &mut run, available);
        estimate
    }

    fn add_text(run: &mut InlineRun, text: &str, font_size: f32) {
        let char_width = font_size * CHAR_WIDTH_RATIO;
        let visible = text.split_whitespace().collect::<Vec<_>>();
        if visible.is_empty() {
            return;
        }
        let chars: usize = visible.iter().map(|word| word.chars().count() + 1).sum();
        let longest = visible
            .iter()
            .map(|word| word.chars().count())
            .max()
            .unwrap_or(0);
        run.advance += chars as f32 * char_width;
        run.min_width = run.min_width.max(longest as f32 * char_width);
        run.line_height = run.line_height.max(font_size * LINE_HEIGHT_RATIO);
    }

    fn walk_children(
        &self,
        doc: &Document,
        node: NodeId,
        available: f32,
        font_size: f32,
        depth: usize,
        flow: &mut Flow,
    ) {
        for child in doc.children(node) {
            match doc.kind(*child) {
                Some(NodeKind::Text(text)) => Self::add_text(&mut flow.run, text, font_size),
                Some(NodeKind::Element(element)) => {
                    if element.is("br") {
                        if flow.run.advance == 0.0 {
                            flow.estimate.height += font_size * LINE_HEIGHT_RATIO;
                        }
                        Self::flush_run(&mut flow.estimate, &mut flow.run, available);
                        continue;
                    }
                    let inline = INLINE_TAGS.contains(&element.name.as_str())
                        && Self::explicit_width(element, font_size).is_none()
                        && !Self::is_hidden(element);
                    if inline && depth < MAX_NESTING {
                        let inner_font = self.font_size(element, font_size);
                        self.walk_children(doc, *child, available, inner_font, depth + 1, flow);
                    } else if inline {
                        let inner_font = self.font_size(element, font_size);
                        Self::add_text(&mut flow.run, &doc.text_content(*child), inner_font);
                    } else {
                        Self::flush_run(&mut flow.estimate, &mut flow.run, available);
                        let block = self.estimate(doc, *child, available, font_size, depth);
                        flow.estimate.min_width = flow.estimate.min_width.max(block.min_width);
                        flow.estimate.height += block.height;
                    }
                }
                _ => {}
            }
        }
    }

    fn flush_run(estimate: &mut Estimate, run: &mut InlineRun, available: f32) {
        if run.advance > 0.0 {
            let lines = (run.advance / available.max(1.0)).ceil().max(1.0);
            estimate.height += lines * run.line_height;
            estimate.min_width = estimate.min_width.max(run.min_width);
        }
        *run = InlineRun::default();
    }
}

impl LayoutProbe for EstimatedLayout {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn measure(&self, document: &Document, node: NodeId) -> BoxMetrics {
        let element = document.element(node);
        let font_size = element
            .map(|element| self.font_size(element, self.default_font_size))
            .unwrap_or(self.default_font_size);
        let offset_width = element
            .and_then(|element| Self::explicit_width(element, font_size))
            .unwrap_or(self.viewport.width);
        let content = self.estimate_children(document, node, offset_width, font_size, 0);
        let offset_height = element
            .and_then(|element| Self::explicit_height(element, font_size))
            .unwrap_or(content.height);
        BoxMetrics {
            scroll_width: content.min_width.max(offset_width),
            scroll_height: content.height.max(offset_height),
            offset_width,
            offset_height,
        }
    }
}
