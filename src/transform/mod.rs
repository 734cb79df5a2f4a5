//! Content normalization stages
//!
//! Each stage is a transform over a [`Document`](crate::dom::Document).
//! Markup-level stages (meta stripping, image proxying, quoted text) take and
//! return HTML text; tree-level stages mutate a rendered page in place. A
//! failure on one node is logged and skipped so the rest of the document is
//! still processed.

pub mod dark_mode;
pub mod hidden;
pub mod image_proxy;
pub mod meta;
pub mod oversize;
pub mod quoted;
pub mod scaling;

pub use dark_mode::DarkModeEngine;
pub use hidden::HiddenContentStripper;
pub use image_proxy::{add_proxy_for_images, ImageErrorRecovery, ProxyOutcome, ProxyTemplate};
pub use meta::strip_viewport_overrides;
pub use oversize::OversizeFixer;
pub use quoted::{QuoteRule, QuotedTextEngine};
pub use scaling::{ScaleOutcome, ScaleState, ScalingEngine};

use crate::dom::NodeId;
use crate::error::Result;
use tracing::debug;

/// Outcome of one tree-level stage run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    pub visited: usize,
    pub changed: usize,
    pub failed: usize,
}

impl StageReport {
    fn record(&mut self, outcome: Result<bool>, stage: &'static str, node: NodeId) {
        self.visited += 1;
        match outcome {
            Ok(true) => self.changed += 1,
            Ok(false) => {}
            Err(err) => {
                self.failed += 1;
                debug!("{}: skipping node {}: {}", stage, node.index(), err);
            }
        }
    }
}

/// Apply `f` to every node, isolating failures per node.
///
/// `f` returns whether it changed the node.
pub(crate) fn for_each_node<F>(stage: &'static str, nodes: Vec<NodeId>, mut f: F) -> StageReport
where
    F: FnMut(NodeId) -> Result<bool>,
{
    let mut report = StageReport::default();
    for node in nodes {
        report.record(f(node), stage, node);
    }
    report
}
