//! Interaction listeners and image completion tracking

use super::state::Platform;
use crate::dom::{Document, NodeId};

/// Listener registrations on the current page.
///
/// Registration is keyed by node, so re-running a pass over the same page
/// never attaches a second listener to an element.
#[derive(Debug, Default, Clone)]
pub struct Listeners {
    links: Vec<NodeId>,
    images: Vec<NodeId>,
    long_press: Vec<NodeId>,
    objects: Vec<NodeId>,
}

fn attach(registry: &mut Vec<NodeId>, nodes: Vec<NodeId>) -> usize {
    let mut added = 0;
    for node in nodes {
        if !registry.contains(&node) {
            registry.push(node);
            added += 1;
        }
    }
    added
}

impl Listeners {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Click listeners on every anchor
    pub fn attach_links(&mut self, document: &Document, container: NodeId) -> usize {
        attach(&mut self.links, document.elements_by_tag(container, "a"))
    }

    /// Load/error listeners on every image, plus long-press download where the
    /// platform has no native image menu
    pub fn attach_images(&mut self, document: &Document, container: NodeId, platform: Platform) -> usize {
        let images = document.elements_by_tag(container, "img");
        if platform.supports_long_press_download() {
            attach(&mut self.long_press, images.clone());
        }
        attach(&mut self.images, images)
    }

    /// Click-to-hide listeners on embedded objects
    pub fn attach_objects(&mut self, document: &Document, container: NodeId) -> usize {
        let mut objects = document.elements_by_tag(container, "object");
        objects.extend(document.elements_by_tag(container, "embed"));
        attach(&mut self.objects, objects)
    }

    /// Drop registrations on nodes no longer attached to the document
    pub fn retain_connected(&mut self, document: &Document) {
        for registry in [&mut self.links, &mut self.images, &mut self.long_press, &mut self.objects] {
            registry.retain(|node| document.is_connected(*node));
        }
    }

    pub fn links(&self) -> &[NodeId] {
        &self.links
    }

    pub fn images(&self) -> &[NodeId] {
        &self.images
    }

    pub fn image_index(&self, node: NodeId) -> Option<usize> {
        self.images.iter().position(|image| *image == node)
    }

    pub fn has_link(&self, node: NodeId) -> bool {
        self.links.contains(&node)
    }

    pub fn has_long_press(&self, node: NodeId) -> bool {
        self.long_press.contains(&node)
    }

    pub fn has_object(&self, node: NodeId) -> bool {
        self.objects.contains(&node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Pending,
    Loaded,
    /// The error handler ran; the element is complete either way
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ImageSlot {
    status: ImageStatus,
    failures: u8,
}

impl Default for ImageSlot {
    fn default() -> Self {
        Self {
            status: ImageStatus::Pending,
            failures: 0,
        }
    }
}

/// Per-image completion state of one displayed markup variant
#[derive(Debug, Default, Clone)]
pub struct ImageTracker {
    slots: Vec<ImageSlot>,
}

impl ImageTracker {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![ImageSlot::default(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn status(&self, index: usize) -> Option<ImageStatus> {
        self.slots.get(index).map(|slot| slot.status)
    }

    pub fn failures(&self, index: usize) -> u8 {
        self.slots.get(index).map(|slot| slot.failures).unwrap_or(0)
    }

    pub fn mark_loaded(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.status = ImageStatus::Loaded;
                true
            }
            None => false,
        }
    }

    /// Record a failure; returns how many times this image has failed
    pub fn mark_failed(&mut self, index: usize) -> u8 {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.status = ImageStatus::Failed;
                slot.failures = slot.failures.saturating_add(1);
                slot.failures
            }
            None => 0,
        }
    }

    /// Every image has either loaded or been through its error handler
    pub fn all_complete(&self) -> bool {
        self.slots.iter().all(|slot| slot.status != ImageStatus::Pending)
    }
}
