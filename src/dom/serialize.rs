//! HTML serialization for the arena tree

use super::{Document, NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

enum Step {
    Node(NodeId, bool),
    Close(NodeId),
}

pub fn inner_html(document: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_steps(document, child_steps(document, id), &mut out);
    out
}

pub fn outer_html(document: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_steps(document, vec![Step::Node(id, false)], &mut out);
    out
}

/// Pending steps for the children of `id`, last child on the bottom
fn child_steps(document: &Document, id: NodeId) -> Vec<Step> {
    let raw = document
        .tag_name(id)
        .map(|name| RAW_TEXT_ELEMENTS.contains(&name))
        .unwrap_or(false);
    document
        .children(id)
        .iter()
        .rev()
        .map(|child| Step::Node(*child, raw))
        .collect()
}

fn write_steps(document: &Document, mut stack: Vec<Step>, out: &mut String) {
    while let Some(step) = stack.pop() {
        let (id, raw_text) = match step {
            Step::Node(id, raw_text) => (id, raw_text),
            Step::Close(id) => {
                if let Some(name) = document.tag_name(id) {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
                continue;
            }
        };
        match document.kind(id) {
            Some(NodeKind::Root) => stack.extend(child_steps(document, id)),
            Some(NodeKind::Doctype(name)) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            Some(NodeKind::Comment(text)) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            Some(NodeKind::Text(text)) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            Some(NodeKind::Element(element)) => {
                out.push('<');
                out.push_str(&element.name);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
                out.push('>');
                if !is_void(&element.name) {
                    stack.push(Step::Close(id));
                    stack.extend(child_steps(document, id));
                }
            }
            None => {}
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
