//! Response record → index entry

use serde::{Deserialize, Serialize};

use crate::archive::{ConsumedRecord, RecordPosition, RecordType};
use crate::lang::{LanguageMix, LanguageScorer};
use crate::sniff::ContentSniffer;
use crate::surt::UrlKey;
use crate::text::{TextSource, extract_text};
use crate::timestamp::cdx_timestamp;

/// JSON block of one index line.
///
/// Field names follow the established CC-NEWS index layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Archive object the record came from
    pub key_name: String,
    pub offset: u64,
    pub length: u64,
    pub server: Option<String>,
    pub url: String,
    /// `WARC-Date` as written in the archive
    pub download_date: String,
    pub status: Option<String>,
    /// Declared `Content-Type` of the HTTP response
    pub mime: Option<String>,
    pub detected_mime: String,
    /// Characters of normalized visible text
    pub net_content_length: usize,
    pub net_no_of_words: usize,
    pub detected_langs: LanguageMix,
}

/// Everything needed to render one index line
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub surt: String,
    pub timestamp: String,
    pub metadata: RecordMetadata,
}

/// Why a record produced no index line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotResponse,
    MissingUri,
    MissingDate,
    BadDate(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotResponse => write!(f, "not a response record"),
            Self::MissingUri => write!(f, "missing WARC-Target-URI"),
            Self::MissingDate => write!(f, "missing WARC-Date"),
            Self::BadDate(d) => write!(f, "unparsable WARC-Date {d:?}"),
        }
    }
}

impl SkipReason {
    /// Malformed headers are worth a warning; other skips are routine
    pub const fn is_malformed(&self) -> bool {
        !matches!(self, Self::NotResponse)
    }
}

#[derive(Debug)]
pub enum Extraction {
    Indexed(IndexEntry),
    Skipped(SkipReason),
}

/// Runs the per-record pipeline with injected sniffer and language scorer.
///
/// Built once per run and shared by all workers.
pub struct RecordExtractor {
    sniffer: Box<dyn ContentSniffer>,
    scorer: Box<dyn LanguageScorer>,
}

impl std::fmt::Debug for RecordExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordExtractor").finish_non_exhaustive()
    }
}

impl RecordExtractor {
    pub fn new(sniffer: Box<dyn ContentSniffer>, scorer: Box<dyn LanguageScorer>) -> Self {
        Self { sniffer, scorer }
    }

    pub fn extract(&self, key: &str, record: &ConsumedRecord) -> Extraction {
        if record.record_type() != RecordType::Response {
            return Extraction::Skipped(SkipReason::NotResponse);
        }
        let header = record.header();
        let pos = record.position();

        let Some(url) = header.target_uri() else {
            return Extraction::Skipped(SkipReason::MissingUri);
        };
        let Some(date) = header.date() else {
            return Extraction::Skipped(SkipReason::MissingDate);
        };
        let Some(timestamp) = cdx_timestamp(date) else {
            return Extraction::Skipped(SkipReason::BadDate(date.to_string()));
        };

        let url_key = UrlKey::parse(url);
        let response = record.http_response();
        if let Some(e) = &response.decode_error {
            log::debug!("{}: payload left encoded ({e})", at(key, pos));
        }

        let detected_mime = self.sniffer.sniff(&response.payload);
        let extracted = extract_text(&response.payload);
        match &extracted.source {
            TextSource::Html | TextSource::Empty => {}
            TextSource::Xml => log::debug!("{}: parsed as XML", at(key, pos)),
            TextSource::XmlAsHtml(e) => {
                log::info!("{}: malformed XML ({e}), parsed as HTML", at(key, pos));
            }
            TextSource::Plain => log::debug!("{}: not markup, decoded as plain text", at(key, pos)),
            TextSource::Undecodable(e) => {
                log::info!("{}: not markup and not UTF-8 ({e}), text left empty", at(key, pos));
            }
        }

        let detected_langs = LanguageMix::from_confidences(self.scorer.confidences(&extracted.text));

        Extraction::Indexed(IndexEntry {
            surt: url_key.surt,
            timestamp,
            metadata: RecordMetadata {
                key_name: key.to_string(),
                offset: pos.offset,
                length: pos.length,
                server: url_key.server,
                url: url.to_string(),
                download_date: date.to_string(),
                status: response.status.map(|s| s.to_string()),
                mime: response.content_type().map(str::to_string),
                detected_mime,
                net_content_length: extracted.char_count(),
                net_no_of_words: extracted.word_count(),
                detected_langs,
            },
        })
    }
}

/// `key@offset+length` for diagnostics
pub(crate) fn at(key: &str, pos: RecordPosition) -> String {
    format!("{key}@{}+{}", pos.offset, pos.length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveReader;
    use crate::sniff::MagicSniffer;

    /// Fixed answer regardless of input
    struct FixedScorer(Vec<(String, f64)>);

    impl LanguageScorer for FixedScorer {
        fn confidences(&self, text: &str) -> Vec<(String, f64)> {
            if text.is_empty() { Vec::new() } else { self.0.clone() }
        }
    }

    fn extractor() -> RecordExtractor {
        RecordExtractor::new(
            Box::new(MagicSniffer),
            Box::new(FixedScorer(vec![
                ("ENGLISH".to_string(), 0.97),
                ("SCOTS".to_string(), 0.0299),
                ("LATIN".to_string(), 0.0001),
            ])),
        )
    }

    fn consumed(warc_fields: &str, block: &[u8]) -> ConsumedRecord {
        let mut data = format!(
            "WARC/1.0\r\n{warc_fields}Content-Length: {}\r\n\r\n",
            block.len()
        )
        .into_bytes();
        data.extend_from_slice(block);
        data.extend_from_slice(b"\r\n\r\n");
        let mut reader = ArchiveReader::new(&data[..]);
        reader.next_record().unwrap().unwrap().drain().unwrap()
    }

    const HELLO: &[u8] =
        b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html><body>Hello world</body></html>";

    #[test]
    fn hello_world_record() {
        let record = consumed(
            "WARC-Type: response\r\nWARC-Target-URI: http://Example.COM/Path\r\nWARC-Date: 2024-01-01T00:00:00Z\r\n",
            HELLO,
        );
        let Extraction::Indexed(entry) = extractor().extract("crawl/a.warc.gz", &record) else {
            panic!("expected an index entry");
        };
        assert_eq!(entry.surt, "com,example)/path");
        assert_eq!(entry.timestamp, "20240101000000");

        let meta = &entry.metadata;
        assert_eq!(meta.key_name, "crawl/a.warc.gz");
        assert_eq!(meta.offset, 0);
        assert_eq!(meta.length, record.position().length);
        assert_eq!(meta.server.as_deref(), Some("example.com"));
        assert_eq!(meta.url, "http://Example.COM/Path");
        assert_eq!(meta.download_date, "2024-01-01T00:00:00Z");
        assert_eq!(meta.status.as_deref(), Some("200"));
        assert_eq!(meta.mime.as_deref(), Some("text/html"));
        assert_eq!(meta.detected_mime, "text/html");
        assert_eq!(meta.net_content_length, "Hello world".len());
        assert_eq!(meta.net_no_of_words, 2);
        assert_eq!(meta.detected_langs.len(), 2);
        assert_eq!(meta.detected_langs.get("LATIN"), None);
    }

    #[test]
    fn non_response_skipped() {
        let record = consumed(
            "WARC-Type: request\r\nWARC-Target-URI: http://a.example/\r\nWARC-Date: 2024-01-01T00:00:00Z\r\n",
            b"GET / HTTP/1.1\r\n\r\n",
        );
        assert!(matches!(
            extractor().extract("k", &record),
            Extraction::Skipped(SkipReason::NotResponse)
        ));
    }

    #[test]
    fn malformed_headers_skipped() {
        let no_uri = consumed(
            "WARC-Type: response\r\nWARC-Date: 2024-01-01T00:00:00Z\r\n",
            HELLO,
        );
        let no_date = consumed(
            "WARC-Type: response\r\nWARC-Target-URI: http://a.example/\r\n",
            HELLO,
        );
        let bad_date = consumed(
            "WARC-Type: response\r\nWARC-Target-URI: http://a.example/\r\nWARC-Date: soon\r\n",
            HELLO,
        );
        let ex = extractor();
        for (record, reason) in [
            (no_uri, SkipReason::MissingUri),
            (no_date, SkipReason::MissingDate),
            (bad_date, SkipReason::BadDate("soon".to_string())),
        ] {
            match ex.extract("k", &record) {
                Extraction::Skipped(r) => {
                    assert!(r.is_malformed());
                    assert_eq!(r, reason);
                }
                Extraction::Indexed(_) => panic!("expected skip"),
            }
        }
    }

    #[test]
    fn empty_payload_degrades() {
        let record = consumed(
            "WARC-Type: response\r\nWARC-Target-URI: http://a.example/\r\nWARC-Date: 2024-01-01T00:00:00Z\r\n",
            b"HTTP/1.1 204 No Content\r\n\r\n",
        );
        let Extraction::Indexed(entry) = extractor().extract("k", &record) else {
            panic!("expected an index entry");
        };
        assert_eq!(entry.metadata.status.as_deref(), Some("204"));
        assert_eq!(entry.metadata.mime, None);
        assert_eq!(entry.metadata.detected_mime, "application/x-empty");
        assert_eq!(entry.metadata.net_content_length, 0);
        assert_eq!(entry.metadata.net_no_of_words, 0);
        assert!(entry.metadata.detected_langs.is_empty());
    }

    #[test]
    fn binary_payload_has_no_text() {
        let mut block = b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\n\r\n".to_vec();
        block.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff, 0xfe]);
        let record = consumed(
            "WARC-Type: response\r\nWARC-Target-URI: http://a.example/i.png\r\nWARC-Date: 2024-01-01T00:00:00Z\r\n",
            &block,
        );
        let Extraction::Indexed(entry) = extractor().extract("k", &record) else {
            panic!("expected an index entry");
        };
        assert_eq!(entry.metadata.detected_mime, "image/png");
        assert_eq!(entry.metadata.net_no_of_words, 0);
    }
}
