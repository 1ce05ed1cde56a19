//! Content-type detection from payload bytes, ignoring declared headers

/// Payload → MIME type
pub trait ContentSniffer: Send + Sync {
    fn sniff(&self, content: &[u8]) -> String;
}

/// Leading tags that mark a document as HTML (WHATWG sniffing table)
const HTML_TAGS: &[&[u8]] = &[
    b"<!doctype html",
    b"<html",
    b"<head",
    b"<script",
    b"<iframe",
    b"<h1",
    b"<div",
    b"<font",
    b"<table",
    b"<a",
    b"<style",
    b"<title",
    b"<b",
    b"<body",
    b"<br",
    b"<p",
    b"<!--",
];

/// How far into an `<?xml` document to look for an `<html` root
const XHTML_WINDOW: usize = 1024;

/// Magic-number sniffer: markup signatures first, then binary formats via `infer`
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl ContentSniffer for MagicSniffer {
    fn sniff(&self, content: &[u8]) -> String {
        if content.is_empty() {
            return "application/x-empty".to_string();
        }
        if let Some(markup) = markup_type(content) {
            return markup.to_string();
        }
        if let Some(kind) = infer::get(content) {
            return kind.mime_type().to_string();
        }
        if looks_like_json(content) {
            return "application/json".to_string();
        }
        if std::str::from_utf8(content).is_ok() {
            "text/plain".to_string()
        } else {
            "application/octet-stream".to_string()
        }
    }
}

/// Strip a UTF-8 BOM and leading whitespace
pub(crate) fn trim_leading(content: &[u8]) -> &[u8] {
    let content = content.strip_prefix(b"\xef\xbb\xbf").unwrap_or(content);
    let start = content
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(content.len());
    &content[start..]
}

pub(crate) fn starts_with_ignore_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}

pub(crate) fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}

fn markup_type(content: &[u8]) -> Option<&'static str> {
    let head = trim_leading(content);
    if starts_with_ignore_case(head, b"<?xml") {
        let window = &head[..head.len().min(XHTML_WINDOW)];
        return Some(if contains_ignore_case(window, b"<html") {
            "text/html"
        } else {
            "text/xml"
        });
    }
    HTML_TAGS
        .iter()
        .any(|tag| {
            starts_with_ignore_case(head, tag)
                && head
                    .get(tag.len())
                    .is_some_and(|&b| b == b'>' || b.is_ascii_whitespace() || *tag == b"<!--")
        })
        .then_some("text/html")
}

fn looks_like_json(content: &[u8]) -> bool {
    matches!(trim_leading(content).first(), Some(b'{' | b'['))
        && serde_json::from_slice::<serde::de::IgnoredAny>(content).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(bytes: &[u8]) -> String {
        MagicSniffer.sniff(bytes)
    }

    #[test]
    fn empty() {
        assert_eq!(sniff(b""), "application/x-empty");
    }

    #[test]
    fn html_by_leading_tag() {
        assert_eq!(sniff(b"<html><body>Hello world</body></html>"), "text/html");
        assert_eq!(sniff(b"\xef\xbb\xbf  <!DOCTYPE html>\n<html>"), "text/html");
        assert_eq!(sniff(b"<p class=x>hi</p>"), "text/html");
        assert_eq!(sniff(b"<!-- comment --><div>"), "text/html");
    }

    #[test]
    fn tag_prefix_must_end() {
        // `<bogus>` is not `<b>`
        assert_ne!(sniff(b"<bogus>text</bogus>"), "text/html");
    }

    #[test]
    fn xml_and_xhtml() {
        assert_eq!(sniff(b"<?xml version=\"1.0\"?><rss></rss>"), "text/xml");
        assert_eq!(
            sniff(b"<?xml version=\"1.0\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">"),
            "text/html"
        );
    }

    #[test]
    fn binary_formats() {
        assert_eq!(sniff(b"%PDF-1.7\n..."), "application/pdf");
        assert_eq!(
            sniff(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0]),
            "image/png"
        );
    }

    #[test]
    fn json_and_text() {
        assert_eq!(sniff(br#"{"a": [1, 2]}"#), "application/json");
        assert_eq!(sniff(b"{not json"), "text/plain");
        assert_eq!(sniff("plain words, ünïcode".as_bytes()), "text/plain");
        assert_eq!(sniff(b"ab\xc3\x28cd"), "application/octet-stream");
    }
}
