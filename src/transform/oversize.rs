//! Overflow fixes for images and long link text

use super::{for_each_node, StageReport};
use crate::dom::style::parse_length_px;
use crate::dom::{Document, Element, NodeId, NodeKind};
use crate::error::{MailframeError, Result};

const URL_SEPARATORS: &[char] = &['/', '?', '&', '=', '.', '-', '_', '#', '%'];

pub struct OversizeFixer {
    long_url_threshold: usize,
    long_url_chunk: usize,
}

impl OversizeFixer {
    pub fn new(long_url_threshold: usize, long_url_chunk: usize) -> Self {
        Self {
            long_url_threshold: long_url_threshold.max(1),
            long_url_chunk: long_url_chunk.max(1),
        }
    }

    /// Bound every image below `container` to the container width.
    ///
    /// Images declared wider than `container_width` also lose their fixed
    /// height so the aspect ratio survives the shrink.
    pub fn limit_image_width(&self, document: &mut Document, container: NodeId, container_width: f32) -> StageReport {
        let images = document.elements_by_tag(container, "img");
        for_each_node("limit-image-width", images, |node| {
            let element = document
                .element_mut(node)
                .ok_or_else(|| MailframeError::malformed("image node is not an element"))?;
            Ok(bound_image(element, container_width))
        })
    }

    /// Insert `<wbr>` break opportunities into overly long words of link text
    pub fn fix_long_urls(&self, document: &mut Document, container: NodeId) -> StageReport {
        let texts: Vec<NodeId> = document
            .elements_by_tag(container, "a")
            .into_iter()
            .flat_map(|anchor| document.descendants(anchor))
            .filter(|node| matches!(document.kind(*node), Some(NodeKind::Text(_))))
            .collect();
        for_each_node("fix-long-url", texts, |node| self.break_text_node(document, node))
    }

    fn break_text_node(&self, document: &mut Document, node: NodeId) -> Result<bool> {
        let text = document
            .text(node)
            .ok_or_else(|| MailframeError::malformed("link text node vanished"))?
            .to_string();
        let Some(pieces) = self.split_long_words(&text) else {
            return Ok(false);
        };
        if document.parent(node).is_none() {
            return Err(MailframeError::malformed("link text is detached"));
        }
        for (index, piece) in pieces.iter().enumerate() {
            if index > 0 {
                let wbr = document.create_element(Element::new("wbr"));
                document.insert_before(node, wbr);
            }
            if index + 1 < pieces.len() {
                let part = document.create_text(piece);
                document.insert_before(node, part);
            }
        }
        if let Some(last) = pieces.last() {
            document.set_text(node, last.clone());
        }
        Ok(true)
    }

    /// Text split at break opportunities, or `None` when no word is too long
    pub fn split_long_words(&self, text: &str) -> Option<Vec<String>> {
        let mut pieces = vec![String::new()];
        let mut broke = false;
        for word in text.split_inclusive(char::is_whitespace) {
            let trimmed = word.trim_end();
            if trimmed.chars().count() <= self.long_url_threshold {
                if let Some(current) = pieces.last_mut() {
                    current.push_str(word);
                }
                continue;
            }
            let mut since_break = 0usize;
            let mut chars = word.chars().peekable();
            while let Some(ch) = chars.next() {
                if let Some(current) = pieces.last_mut() {
                    current.push(ch);
                }
                since_break += 1;
                let more_word = chars.peek().map(|next| !next.is_whitespace()).unwrap_or(false);
                if more_word && (URL_SEPARATORS.contains(&ch) || since_break >= self.long_url_chunk) {
                    pieces.push(String::new());
                    since_break = 0;
                    broke = true;
                }
            }
        }
        broke.then_some(pieces)
    }
}

fn bound_image(element: &mut Element, container_width: f32) -> bool {
    let mut style = element.style();
    let mut changed = false;
    if style.get("max-width").is_none() {
        style.set("max-width", "100%");
        changed = true;
    }
    let declared_width = style
        .get("width")
        .and_then(|value| parse_length_px(value, 16.0))
        .or_else(|| element.attr("width").and_then(|value| parse_length_px(value, 16.0)));
    let oversized = declared_width
        .map(|width| container_width > 0.0 && width > container_width)
        .unwrap_or(false);
    if oversized && style.get("height") != Some("auto") {
        style.set("height", "auto");
        changed = true;
    }
    if changed {
        element.set_style(&style);
    }
    changed
}
