//! CDXJ index lines: `surt timestamp {json}`

use crate::extractor::{IndexEntry, RecordMetadata};

/// Error from reading back an index line
#[derive(Debug)]
pub enum CdxjError {
    /// Line has fewer than three space-separated parts
    MissingField(&'static str),
    Json(serde_json::Error),
}

impl std::fmt::Display for CdxjError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(name) => write!(f, "CDXJ line without {name}"),
            Self::Json(e) => write!(f, "CDXJ metadata: {e}"),
        }
    }
}

impl std::error::Error for CdxjError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MissingField(_) => None,
            Self::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for CdxjError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Render one newline-terminated line; JSON is compact with non-ASCII kept as is
pub fn format_line(
    surt: &str,
    timestamp: &str,
    metadata: &RecordMetadata,
) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(metadata)?;
    Ok(format!("{surt} {timestamp} {json}\n"))
}

/// Split a line back into `(surt, timestamp, metadata)`
pub fn parse_line(line: &str) -> Result<IndexEntry, CdxjError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let (surt, rest) = line
        .split_once(' ')
        .ok_or(CdxjError::MissingField("timestamp"))?;
    let (timestamp, json) = rest
        .split_once(' ')
        .ok_or(CdxjError::MissingField("metadata"))?;
    Ok(IndexEntry {
        surt: surt.to_string(),
        timestamp: timestamp.to_string(),
        metadata: serde_json::from_str(json)?,
    })
}

impl IndexEntry {
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        format_line(&self.surt, &self.timestamp, &self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::LanguageMix;

    fn entry() -> IndexEntry {
        IndexEntry {
            surt: "de,zeitung)/artikel/über".to_string(),
            timestamp: "20240101000000".to_string(),
            metadata: RecordMetadata {
                key_name: "crawl-data/CC-NEWS/2024/01/CC-NEWS-20240101000000-00000.warc.gz"
                    .to_string(),
                offset: 1234,
                length: 567,
                server: Some("zeitung.de".to_string()),
                url: "https://zeitung.de/artikel/über".to_string(),
                download_date: "2024-01-01T00:00:00Z".to_string(),
                status: Some("200".to_string()),
                mime: Some("text/html; charset=utf-8".to_string()),
                detected_mime: "text/html".to_string(),
                net_content_length: 42,
                net_no_of_words: 7,
                detected_langs: LanguageMix::from_confidences([
                    ("GERMAN".to_string(), 0.875),
                    ("DUTCH".to_string(), 0.125),
                ]),
            },
        }
    }

    #[test]
    fn line_shape() {
        let line = entry().to_line().unwrap();
        assert!(line.starts_with("de,zeitung)/artikel/über 20240101000000 {\"key_name\":"));
        assert!(line.ends_with("}\n"));
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains(r#""detected_langs":{"GERMAN":0.875,"DUTCH":0.125}"#));
        // Non-ASCII stays literal
        assert!(!line.contains("\\u"));
    }

    #[test]
    fn parse_recovers_entry() {
        let original = entry();
        let parsed = parse_line(&original.to_line().unwrap()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn nulls_survive() {
        let mut original = entry();
        original.metadata.server = None;
        original.metadata.status = None;
        original.metadata.mime = None;
        original.metadata.detected_langs = LanguageMix::default();
        let line = original.to_line().unwrap();
        assert!(line.contains(r#""status":null"#));
        assert_eq!(parse_line(&line).unwrap(), original);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            parse_line("onlykey"),
            Err(CdxjError::MissingField("timestamp"))
        ));
        assert!(matches!(
            parse_line("key 20240101000000"),
            Err(CdxjError::MissingField("metadata"))
        ));
        assert!(matches!(
            parse_line("key 20240101000000 {broken"),
            Err(CdxjError::Json(_))
        ));
    }
}
