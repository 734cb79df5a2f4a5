//! Arena-backed document tree
//!
//! Email markup is parsed with `scraper` (html5ever) and copied into a small
//! mutable arena so pipeline stages can patch attributes, insert break
//! opportunities and drop subtrees without a live rendering engine.

pub mod serialize;
pub mod style;

use scraper::{ElementRef, Html};

pub use style::{Declaration, InlineStyle};

/// Handle to a node inside one [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Doctype(String),
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_ascii_lowercase(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self
            .attrs
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(index).1)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Parsed `style` attribute; empty when absent
    pub fn style(&self) -> InlineStyle {
        self.attr("style").map(InlineStyle::parse).unwrap_or_default()
    }

    /// Write a style back, dropping the attribute when no declarations remain
    pub fn set_style(&mut self, style: &InlineStyle) {
        if style.is_empty() {
            self.remove_attr("style");
        } else {
            self.set_attr("style", style.to_string());
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed email body plus whatever page skeleton wraps it
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse markup the way `innerHTML` assignment does: in body context,
    /// with `html`/`head`/`body` tags folded away.
    pub fn parse_fragment(html: &str) -> Self {
        let parsed = Html::parse_fragment(html);
        let mut document = Self::new();
        let root = document.root();
        document.import_children(root, parsed.root_element());
        document
    }

    fn import_children(&mut self, parent: NodeId, element: ElementRef<'_>) {
        let mut pending = vec![(parent, element)];
        while let Some((parent, element)) = pending.pop() {
            for child in element.children() {
                let kind = match child.value() {
                    scraper::Node::Element(source) => {
                        let mut element = Element::new(source.name());
                        for (name, value) in source.attrs() {
                            element.attrs.push((name.to_string(), value.to_string()));
                        }
                        NodeKind::Element(element)
                    }
                    scraper::Node::Text(text) => NodeKind::Text(text.text.to_string()),
                    scraper::Node::Comment(comment) => NodeKind::Comment(comment.comment.to_string()),
                    scraper::Node::Doctype(doctype) => NodeKind::Doctype(doctype.name().to_string()),
                    _ => continue,
                };
                let id = self.create(kind);
                self.append_child(parent, id);
                if let Some(child_ref) = ElementRef::wrap(child) {
                    pending.push((id, child_ref));
                }
            }
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    fn create(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.create(NodeKind::Element(element))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create(NodeKind::Text(text.to_string()))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.data(id).map(|data| &data.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id.0).map(|data| &mut data.kind) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        if let Some(NodeKind::Text(text)) = self.nodes.get_mut(id.0).map(|data| &mut data.kind) {
            *text = value.into();
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.element(id).map(|element| element.is(name)).unwrap_or(false)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).and_then(|data| data.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id).map(|data| data.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|sibling| *sibling == id)?;
        siblings.get(index + 1).copied()
    }

    /// Unlink a node (and its subtree) from its parent
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(data) = self.nodes.get_mut(parent.0) {
            data.children.retain(|child| *child != id);
        }
        if let Some(data) = self.nodes.get_mut(id.0) {
            data.parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.data(parent).is_none() || self.data(child).is_none() {
            return;
        }
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Insert `child` directly before `reference` under the reference's parent
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        if child == reference || self.data(child).is_none() {
            return;
        }
        self.detach(child);
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|sibling| *sibling == reference)
            .unwrap_or(self.nodes[parent.0].children.len());
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Whether the node is still reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent(node);
        }
        result
    }

    /// All nodes below `id` in document (pre-)order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            result.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        result
    }

    /// Element descendants in document order, like `querySelectorAll("*")`
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|node| self.element(*node).is_some())
            .collect()
    }

    pub fn elements_by_tag(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|node| self.is_element(*node, tag))
            .collect()
    }

    pub fn element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|node| self.element(*node).and_then(Element::id) == Some(element_id))
    }

    /// Concatenated text of the subtree, skipping style and script bodies
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            match self.kind(node) {
                Some(NodeKind::Text(text)) => out.push_str(text),
                Some(NodeKind::Element(element))
                    if matches!(element.name.as_str(), "style" | "script" | "title") => {}
                Some(_) => stack.extend(self.children(node).iter().rev().copied()),
                None => {}
            }
        }
        out
    }

    /// Deep-copy `source`'s children (of `from`) under `parent` in this document
    pub fn import(&mut self, parent: NodeId, source: &Document, from: NodeId) {
        let mut pending = vec![(parent, from)];
        while let Some((parent, from)) = pending.pop() {
            for child in source.children(from) {
                let Some(kind) = source.kind(*child) else {
                    continue;
                };
                if matches!(kind, NodeKind::Root) {
                    continue;
                }
                let copy = self.create(kind.clone());
                self.append_child(parent, copy);
                pending.push((copy, *child));
            }
        }
    }

    /// Serialize the children of the root
    pub fn to_html(&self) -> String {
        serialize::inner_html(self, self.root())
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        serialize::inner_html(self, id)
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        serialize::outer_html(self, id)
    }
}
