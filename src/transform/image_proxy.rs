//! Image proxy rewriting
//!
//! Remote image sources are routed through a caller-supplied URL template.
//! The original URL is kept in `data-original-src` so a failed proxy fetch can
//! fall back to it. That attribute is owned by this stage: copies arriving in
//! the sender's markup are dropped before any rewriting.

use crate::dom::{Document, Element};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::debug;
use url::Url;

pub const ORIGINAL_SRC_ATTR: &str = "data-original-src";

const ENCODED_PLACEHOLDER: &str = "{url}";
const RAW_PLACEHOLDER: &str = "{raw_url}";

/// A proxy URL pattern such as `https://proxy.example/img?u={url}`.
///
/// `{url}` receives the percent-encoded original URL, `{raw_url}` the URL verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTemplate(String);

impl ProxyTemplate {
    /// `None` when the template is blank or has no placeholder
    pub fn new(template: &str) -> Option<Self> {
        let template = template.trim();
        if template.contains(ENCODED_PLACEHOLDER) || template.contains(RAW_PLACEHOLDER) {
            Some(Self(template.to_string()))
        } else {
            if !template.is_empty() {
                debug!("Ignoring image proxy template without placeholder: {}", template);
            }
            None
        }
    }

    pub fn apply(&self, url: &str) -> String {
        let encoded = utf8_percent_encode(url, NON_ALPHANUMERIC).to_string();
        self.0
            .replace(ENCODED_PLACEHOLDER, &encoded)
            .replace(RAW_PLACEHOLDER, url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyOutcome {
    pub html: String,
    pub has_img_or_video: bool,
}

/// Normalize a source to an absolute remote URL, or `None` for local/inline sources
fn remote_url(src: &str) -> Option<String> {
    let src = src.trim();
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    match Url::parse(src) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(src.to_string()),
        _ => None,
    }
}

fn proxy_srcset(srcset: &str, template: &ProxyTemplate) -> String {
    srcset
        .split(',')
        .map(|candidate| {
            let candidate = candidate.trim();
            let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
                Some((url, descriptor)) => (url, Some(descriptor.trim())),
                None => (candidate, None),
            };
            let url = remote_url(url)
                .map(|remote| template.apply(&remote))
                .unwrap_or_else(|| url.to_string());
            match descriptor {
                Some(descriptor) if !descriptor.is_empty() => format!("{} {}", url, descriptor),
                _ => url,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn proxy_element(element: &mut Element, template: &ProxyTemplate) -> bool {
    let mut changed = false;
    let source_attr = if element.is("video") { "poster" } else { "src" };
    if let Some(remote) = element.attr(source_attr).and_then(remote_url) {
        element.set_attr(ORIGINAL_SRC_ATTR, remote.clone());
        element.set_attr(source_attr, template.apply(&remote));
        changed = true;
    }
    if let Some(srcset) = element.attr("srcset").map(str::to_string) {
        let rewritten = proxy_srcset(&srcset, template);
        if rewritten != srcset {
            element.set_attr("srcset", rewritten);
            changed = true;
        }
    }
    changed
}

/// Route every remote image through `template` and report whether the
/// markup contains any image or video element.
///
/// Markup without a template (or without media) comes back untouched apart
/// from dropping any sender-supplied `data-original-src`.
pub fn add_proxy_for_images(html: &str, template: Option<&ProxyTemplate>) -> ProxyOutcome {
    let mut document = Document::parse_fragment(html);
    let root = document.root();
    let mut dropped = 0;
    for node in document.descendant_elements(root) {
        if let Some(element) = document.element_mut(node) {
            if element.remove_attr(ORIGINAL_SRC_ATTR).is_some() {
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        debug!("Dropped {} sender-supplied {} attribute(s)", dropped, ORIGINAL_SRC_ATTR);
    }

    let media: Vec<_> = document
        .descendant_elements(root)
        .into_iter()
        .filter(|node| {
            document.is_element(*node, "img")
                || document.is_element(*node, "video")
                || document.is_element(*node, "source")
        })
        .collect();
    let has_img_or_video = media
        .iter()
        .any(|node| document.is_element(*node, "img") || document.is_element(*node, "video"));

    let Some(template) = template else {
        return ProxyOutcome {
            html: if dropped > 0 { document.to_html() } else { html.to_string() },
            has_img_or_video,
        };
    };

    let mut changed = 0;
    for node in media {
        if let Some(element) = document.element_mut(node) {
            if element.is("source") && !element.has_attr("srcset") {
                continue;
            }
            if proxy_element(element, template) {
                changed += 1;
            }
        }
    }

    debug!("Image proxy rewrote {} element(s)", changed);
    ProxyOutcome {
        html: if changed + dropped > 0 { document.to_html() } else { html.to_string() },
        has_img_or_video,
    }
}

/// What happened when an image failed to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageErrorRecovery {
    /// The proxied source was replaced by the original URL
    Restored(String),
    /// No fallback left; the broken image was hidden
    Hidden,
}

/// Reset a failed image: first back to its un-proxied URL, then out of sight
pub fn handle_image_load_error(element: &mut Element) -> ImageErrorRecovery {
    if let Some(original) = element.remove_attr(ORIGINAL_SRC_ATTR) {
        if element.attr("src") != Some(original.as_str()) {
            element.set_attr("src", original.clone());
            element.remove_attr("srcset");
            return ImageErrorRecovery::Restored(original);
        }
    }
    let mut style = element.style();
    style.set("display", "none");
    element.set_style(&style);
    ImageErrorRecovery::Hidden
}
