//! CC-NEWS table of contents from the monthly `warc.paths.gz` listings

use std::io::{self, BufRead, BufReader};

use ccindex_core::{FetchError, ObjectFetcher};
use chrono::Datelike;
use flate2::read::MultiGzDecoder;

/// Key prefix of the news crawl
pub const DEFAULT_PREFIX: &str = "crawl-data/CC-NEWS";

/// The news crawl starts in 2016
pub const DEFAULT_FIRST_YEAR: i32 = 2016;

/// Last month to list: the current one
pub fn current_month() -> (i32, u32) {
    let today = chrono::Utc::now().date_naive();
    (today.year(), today.month())
}

/// Keys of the monthly listings from January of `first_year` through `until`
pub fn listing_keys(prefix: &str, first_year: i32, until: (i32, u32)) -> Vec<String> {
    let prefix = prefix.trim_end_matches('/');
    let (last_year, last_month) = until;
    (first_year..=last_year)
        .flat_map(|year| {
            let months = if year == last_year { last_month } else { 12 };
            (1..=months).map(move |month| format!("{prefix}/{year}/{month:02}/warc.paths.gz"))
        })
        .collect()
}

/// Archive keys from one decompressed listing; only `warc.gz` entries count
pub fn parse_listing(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut keys = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let key = line.trim();
        if key.ends_with("warc.gz") {
            keys.push(key.to_string());
        }
    }
    Ok(keys)
}

/// Fetch every monthly listing and hand each archive key to `emit`.
///
/// Months without a listing (not crawled, or not yet published) are skipped.
/// Returns the number of keys emitted.
pub fn list_archives(
    fetcher: &dyn ObjectFetcher,
    prefix: &str,
    first_year: i32,
    until: (i32, u32),
    mut emit: impl FnMut(&str) -> io::Result<()>,
) -> Result<usize, FetchError> {
    let mut count = 0;
    for listing in listing_keys(prefix, first_year, until) {
        let stream = match fetcher.get(&listing, None) {
            Ok(stream) => stream,
            Err(e) if e.is_not_found() => {
                log::debug!("{listing}: not published, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };
        let keys = parse_listing(BufReader::new(MultiGzDecoder::new(stream)))?;
        log::debug!("{listing}: {} archives", keys.len());
        for key in &keys {
            emit(key)?;
        }
        count += keys.len();
    }
    Ok(count)
}
