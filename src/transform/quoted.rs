//! Quoted reply detection and collapsing
//!
//! Mail clients mark the start of a quoted reply chain in different ways.
//! Each convention is one [`QuoteRule`]; the engine cuts the document at the
//! first node any rule claims and drops everything after it.

use crate::dom::{Document, NodeId, NodeKind};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Recognizes the first node of a quoted section
pub trait QuoteRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_boundary(&self, document: &Document, node: NodeId) -> bool;
}

/// Elements carrying a provider's quote container class
pub struct ClassRule {
    classes: &'static [&'static str],
}

impl QuoteRule for ClassRule {
    fn name(&self) -> &'static str {
        "class"
    }

    fn is_boundary(&self, document: &Document, node: NodeId) -> bool {
        document
            .element(node)
            .map(|element| self.classes.iter().any(|class| element.has_class(class)))
            .unwrap_or(false)
    }
}

/// Elements with a provider's reply-header id
pub struct IdRule {
    ids: &'static [&'static str],
}

impl QuoteRule for IdRule {
    fn name(&self) -> &'static str {
        "id"
    }

    fn is_boundary(&self, document: &Document, node: NodeId) -> bool {
        document
            .element(node)
            .and_then(|element| element.id())
            .map(|id| self.ids.iter().any(|candidate| candidate.eq_ignore_ascii_case(id)))
            .unwrap_or(false)
    }
}

/// `<blockquote type="cite">`, and any blockquote that nothing but
/// whitespace follows (a trailing quoted chain).
pub struct BlockquoteRule;

impl QuoteRule for BlockquoteRule {
    fn name(&self) -> &'static str {
        "blockquote"
    }

    fn is_boundary(&self, document: &Document, node: NodeId) -> bool {
        let Some(element) = document.element(node) else {
            return false;
        };
        if !element.is("blockquote") {
            return false;
        }
        if element
            .attr("type")
            .map(|kind| kind.eq_ignore_ascii_case("cite"))
            .unwrap_or(false)
        {
            return true;
        }
        !has_visible_content_after(document, node)
    }
}

static ATTRIBUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*(on\s.{1,240}\bwrote|le\s.{1,240}\ba\s+écrit|am\s.{1,240}\bschrieb|el\s.{1,240}\bescribió|il\s.{1,240}\bha\s+scritto|op\s.{1,240}\bschreef)\s*:?\s*$",
    )
    .unwrap()
});

static SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*-{2,}\s*original\s+message\s*-{2,}").unwrap()
});

/// Attribution lines ("On <date>, <person> wrote:") and
/// "-----Original Message-----" separators
pub struct MarkerTextRule;

impl MarkerTextRule {
    fn matches(text: &str) -> bool {
        let text = text.trim();
        !text.is_empty() && text.len() < 400 && (ATTRIBUTION.is_match(text) || SEPARATOR.is_match(text))
    }
}

impl QuoteRule for MarkerTextRule {
    fn name(&self) -> &'static str {
        "marker-text"
    }

    fn is_boundary(&self, document: &Document, node: NodeId) -> bool {
        match document.kind(node) {
            Some(NodeKind::Text(text)) => {
                let parent_is_block = document
                    .parent(node)
                    .and_then(|parent| document.tag_name(parent))
                    .map(|tag| matches!(tag, "div" | "p" | "td" | "blockquote" | "body"))
                    .unwrap_or(true);
                // Text inside a matching block is claimed by the block itself
                parent_is_block
                    && document.parent(node).map_or(true, |parent| {
                        !Self::matches(&document.text_content(parent))
                    })
                    && Self::matches(text)
            }
            Some(NodeKind::Element(element))
                if matches!(element.name.as_str(), "div" | "p" | "span") =>
            {
                document.elements_by_tag(node, "blockquote").is_empty()
                    && Self::matches(&document.text_content(node))
            }
            _ => false,
        }
    }
}

fn has_visible_content_after(document: &Document, node: NodeId) -> bool {
    let mut current = node;
    loop {
        let mut sibling = document.next_sibling(current);
        while let Some(next) = sibling {
            let visible = match document.kind(next) {
                Some(NodeKind::Text(text)) => !text.trim().is_empty(),
                Some(NodeKind::Element(element)) => {
                    element.is("img") || !document.text_content(next).trim().is_empty()
                }
                _ => false,
            };
            if visible {
                return true;
            }
            sibling = document.next_sibling(next);
        }
        match document.parent(current) {
            Some(parent) if parent != document.root() => current = parent,
            _ => return false,
        }
    }
}

pub fn default_rules() -> Vec<Box<dyn QuoteRule>> {
    vec![
        Box::new(ClassRule {
            classes: &[
                "gmail_quote",
                "gmail_extra",
                "yahoo_quoted",
                "moz-cite-prefix",
                "protonmail_quote",
                "zmail_extra",
                "OutlookMessageHeader",
                "x_gmail_quote",
            ],
        }),
        Box::new(IdRule {
            ids: &[
                "divRplyFwdMsg",
                "appendonsend",
                "OLK_SRC_BODY_SECTION",
                "x_divRplyFwdMsg",
                "isReplyContent",
            ],
        }),
        Box::new(BlockquoteRule),
        Box::new(MarkerTextRule),
    ]
}

/// Produces the quote-collapsed variant of a message body
pub struct QuotedTextEngine {
    rules: Vec<Box<dyn QuoteRule>>,
}

impl Default for QuotedTextEngine {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl QuotedTextEngine {
    pub fn new(rules: Vec<Box<dyn QuoteRule>>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: Box<dyn QuoteRule>) -> Self {
        self.rules.push(rule);
        self
    }

    fn find_boundary(&self, document: &Document) -> Option<(NodeId, &'static str)> {
        for node in document.descendants(document.root()) {
            if let Some(rule) = self.rules.iter().find(|rule| rule.is_boundary(document, node)) {
                return Some((node, rule.name()));
            }
        }
        None
    }

    pub fn has_quoted_html(&self, html: &str) -> bool {
        self.find_boundary(&Document::parse_fragment(html)).is_some()
    }

    /// The markup with everything from the first quote boundary onward removed.
    ///
    /// Returns the input unchanged when there is no boundary, or when cutting
    /// would leave nothing visible.
    pub fn remove_quoted_html(&self, html: &str) -> String {
        let mut document = Document::parse_fragment(html);
        let Some((boundary, rule)) = self.find_boundary(&document) else {
            return html.to_string();
        };

        truncate_from(&mut document, boundary);
        trim_trailing_whitespace(&mut document);

        let root = document.root();
        let has_media = !document.elements_by_tag(root, "img").is_empty()
            || !document.elements_by_tag(root, "video").is_empty();
        if document.text_content(root).trim().is_empty() && !has_media {
            debug!("Quote boundary ({}) would empty the body; keeping full markup", rule);
            return html.to_string();
        }
        debug!("Collapsed quoted text at {} boundary", rule);
        document.to_html()
    }
}

/// Detach `boundary` and every node after it in document order
fn truncate_from(document: &mut Document, boundary: NodeId) {
    let root = document.root();
    let mut current = boundary;
    while current != root {
        let Some(parent) = document.parent(current) else {
            break;
        };
        while let Some(next) = document.next_sibling(current) {
            document.detach(next);
        }
        current = parent;
    }
    document.detach(boundary);
}

/// Drop trailing `<br>`s and whitespace left dangling by the cut
fn trim_trailing_whitespace(document: &mut Document) {
    let mut parent = document.root();
    loop {
        let Some(&last) = document.children(parent).last() else {
            return;
        };
        let removable = match document.kind(last) {
            Some(NodeKind::Text(text)) => text.trim().is_empty(),
            Some(NodeKind::Element(element)) => element.is("br"),
            _ => false,
        };
        if removable {
            document.detach(last);
            continue;
        }
        if document.element(last).map(|element| !element.is("img")).unwrap_or(false) {
            parent = last;
        } else {
            return;
        }
    }
}

/// [`QuotedTextEngine::remove_quoted_html`] with the default rule set
pub fn remove_quoted_html(html: &str) -> String {
    QuotedTextEngine::default().remove_quoted_html(html)
}
