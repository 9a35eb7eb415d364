//! Markup stripping for status text.

use std::sync::OnceLock;

use regex::Regex;

/// Converts platform HTML fragments to plain text.
pub trait MarkupSanitizer: Send + Sync {
    fn strip_markup(&self, html: &str) -> String;
}

/// Regex-based sanitizer: drops tags, decodes entities, keeps line breaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagStripper;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"))
}

impl MarkupSanitizer for TagStripper {
    fn strip_markup(&self, html: &str) -> String {
        let without_tags = tag_re().replace_all(html, "");
        html_escape::decode_html_entities(&without_tags).into_owned()
    }
}

/// Replaces `<br />` (and its `<br>`/`<br/>` spellings) with newlines.
#[must_use]
pub fn line_breaks_to_newlines(html: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid br regex"));
    re.replace_all(html, "\n").into_owned()
}
