//! Subcommands and the pieces they share

pub mod config;
pub mod download;
pub mod index;
pub mod toc;

use anyhow::{Context, Result};
use ccindex_core::{HttpFetcher, LocalFetcher, ObjectFetcher};
use ccindex_warc::{LinguaScorer, MagicSniffer, RecordExtractor};

use crate::config::Config;

/// Object store selected by the configuration: a local mirror or HTTP
pub fn build_fetcher(config: &Config) -> Result<Box<dyn ObjectFetcher>> {
    match &config.store.local_root {
        Some(root) => {
            log::debug!("Reading objects from {}", root.display());
            Ok(Box::new(LocalFetcher::new(root.clone())))
        }
        None => {
            log::debug!("Reading objects from {}", config.store.base_url);
            let fetcher = HttpFetcher::new(&config.store.base_url, &config.http.http_config())
                .with_context(|| {
                    format!("Failed to build HTTP client for {}", config.store.base_url)
                })?;
            Ok(Box::new(fetcher))
        }
    }
}

pub fn build_extractor(config: &Config) -> RecordExtractor {
    RecordExtractor::new(
        Box::new(MagicSniffer),
        Box::new(LinguaScorer::new(config.language.preload_models)),
    )
}
