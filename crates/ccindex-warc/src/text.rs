//! Visible-text extraction with an explicit content-shape dispatch.
//!
//! Content is classified once ([`ContentShape::classify`]) and then goes
//! down exactly one extraction path. Malformed XML is the only case that
//! falls through to a second parser (HTML, which accepts anything).

use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::{Html, Node};

use crate::sniff::{contains_ignore_case, starts_with_ignore_case, trim_leading};

/// Without a `<` this far in, content is not treated as markup
const MARKUP_WINDOW: usize = 4096;

/// An `<?xml` document mentioning `<html` this early is XHTML
const XHTML_WINDOW: usize = 1024;

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentShape {
    LooksLikeMarkup,
    LooksLikeXml,
    PlainOrEmpty,
}

impl ContentShape {
    pub fn classify(content: &[u8]) -> Self {
        let head = trim_leading(content);
        let window = &head[..head.len().min(MARKUP_WINDOW)];
        if !window.contains(&b'<') {
            return Self::PlainOrEmpty;
        }
        if starts_with_ignore_case(head, b"<?xml")
            && !contains_ignore_case(&head[..head.len().min(XHTML_WINDOW)], b"<html")
        {
            return Self::LooksLikeXml;
        }
        Self::LooksLikeMarkup
    }
}

/// Which path produced the text, and what went wrong on the way
#[derive(Debug)]
pub enum TextSource {
    Html,
    Xml,
    /// XML parse failed, text came from the HTML parser
    XmlAsHtml(quick_xml::Error),
    Plain,
    /// Nothing to decode
    Empty,
    /// Not valid UTF-8; text is empty
    Undecodable(std::str::Utf8Error),
}

/// Normalized visible text plus the path that produced it
#[derive(Debug)]
pub struct ExtractedText {
    pub text: String,
    pub source: TextSource,
}

impl ExtractedText {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Classify, extract along one path, normalize
pub fn extract_text(content: &[u8]) -> ExtractedText {
    let (raw, source) = match ContentShape::classify(content) {
        ContentShape::LooksLikeMarkup => (html_text(content), TextSource::Html),
        ContentShape::LooksLikeXml => match xml_text(content) {
            Ok(text) => (text, TextSource::Xml),
            Err(e) => (html_text(content), TextSource::XmlAsHtml(e)),
        },
        ContentShape::PlainOrEmpty => match std::str::from_utf8(content) {
            Ok(s) if s.trim().is_empty() => (String::new(), TextSource::Empty),
            Ok(s) => (s.to_string(), TextSource::Plain),
            Err(e) => (String::new(), TextSource::Undecodable(e)),
        },
    };
    ExtractedText {
        text: normalize(&raw),
        source,
    }
}

/// Collapse whitespace runs to one space, trim both ends
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Text nodes of an HTML document in order, hidden elements skipped
pub fn html_text(content: &[u8]) -> String {
    let document = Html::parse_document(&String::from_utf8_lossy(content));
    let mut out = String::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            matches!(a.value(), Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out
}

/// Text and CDATA of an XML document; errors on malformed input
pub fn xml_text(content: &[u8]) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);

    let mut out = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(t) => match t.unescape() {
                Ok(s) => out.push_str(&s),
                // Undefined entity; keep the raw text
                Err(_) => out.push_str(&String::from_utf8_lossy(&t)),
            },
            Event::CData(c) => out.push_str(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
