//! ccindex WARC - CDXJ indexing of web archive objects
//!
//! Streams WARC records out of archive objects and turns every `response`
//! record into one CDXJ line: a SURT sort key, the capture timestamp and a
//! JSON block with detected content type, visible-text statistics and
//! language confidences.
//!
//! # Example
//!
//! ```ignore
//! use ccindex_core::{LocalFetcher, ProgressContext};
//! use ccindex_warc::{Config, LinguaScorer, MagicSniffer, RecordExtractor, run_batch};
//!
//! let fetcher = LocalFetcher::new("/data/commoncrawl");
//! let extractor = RecordExtractor::new(Box::new(MagicSniffer), Box::new(LinguaScorer::new(false)));
//! let keys = vec!["crawl-data/CC-NEWS/2024/01/CC-NEWS-20240101000000-00000.warc.gz".to_string()];
//!
//! let summary = run_batch(keys, &fetcher, &extractor, &Config::default(), &ProgressContext::new())?;
//! println!("{} lines", summary.indexed);
//! ```

pub mod archive;
pub mod cdxj;
pub mod config;
pub mod download;
pub mod extractor;
pub mod lang;
pub mod manifest;
pub mod runner;
pub mod sniff;
pub mod stats;
pub mod surt;
pub mod text;
pub mod timestamp;
pub mod worker;

// Re-exports
pub use archive::{ArchiveReader, ConsumedRecord, RecordPosition, RecordType, UnconsumedRecord};
pub use cdxj::{CdxjError, format_line, parse_line};
pub use config::Config;
pub use extractor::{Extraction, IndexEntry, RecordExtractor, RecordMetadata, SkipReason};
pub use lang::{LanguageMix, LanguageScorer, LinguaScorer};
pub use runner::{read_keys, run_batch, run_batch_with, run_single};
pub use sniff::{ContentSniffer, MagicSniffer};
pub use stats::{BatchSummary, ObjectStats};
