//! Removal of viewport declarations that fight the host's own responsive handling

use once_cell::sync::Lazy;
use regex::Regex;

static VIEWPORT_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\b[^>]*\bname\s*=\s*['"]?\s*viewport\b[^>]*>"#).unwrap()
});

static LANDSCAPE_MEDIA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)@media\b[^{;]*\(\s*orientation\s*:\s*landscape\s*\)[^{;]*\{").unwrap()
});

/// Strip `<meta name="viewport">` tags and `@media (orientation: landscape)` blocks
pub fn strip_viewport_overrides(html: &str) -> String {
    let without_meta = VIEWPORT_META.replace_all(html, "");
    strip_landscape_blocks(&without_meta)
}

fn strip_landscape_blocks(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(found) = LANDSCAPE_MEDIA.find(rest) {
        let body = &rest[found.end()..];
        let Some(end) = matching_brace(body) else {
            // Unterminated block: leave the markup alone
            break;
        };
        out.push_str(&rest[..found.start()]);
        rest = &body[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Byte offset of the `}` closing a block whose `{` was already consumed.
///
/// The search stops at the end of the enclosing style element.
fn matching_brace(body: &str) -> Option<usize> {
    let limit = body
        .to_ascii_lowercase()
        .find("</style")
        .unwrap_or(body.len());
    let mut depth = 1usize;
    for (index, ch) in body[..limit].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_viewport_meta_variants() {
        let html = r#"<meta name="viewport" content="width=600"><meta name='viewport' content='width=device-width'><META NAME=viewport CONTENT="initial-scale=1"><meta charset="utf-8"><p>x</p>"#;
        assert_eq!(strip_viewport_overrides(html), r#"<meta charset="utf-8"><p>x</p>"#);
    }

    #[test]
    fn test_strips_landscape_media_blocks() {
        let html = "<style>.a{color:red}@media screen and (max-width: 800px) and (orientation: landscape) { .b { width: 100%; } .c { font-size: 20px; } }.d{margin:0}</style>";
        assert_eq!(
            strip_viewport_overrides(html),
            "<style>.a{color:red}.d{margin:0}</style>"
        );
    }

    #[test]
    fn test_keeps_other_media_queries() {
        let html = "<style>@media screen and (max-width: 600px) { .b { width: 100%; } }</style>";
        assert_eq!(strip_viewport_overrides(html), html);
    }
}
