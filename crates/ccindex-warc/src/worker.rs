//! Indexing one archive object

use std::io::{self, Read, Write};
use std::sync::atomic::Ordering;
use std::time::Instant;

use ccindex_core::progress::upgrade_to_bar;
use ccindex_core::{ByteRange, CdxjSink, FetchError, ObjectError, ObjectFetcher};
use indicatif::ProgressBar;

use crate::archive::{ArchiveReader, RecordType};
use crate::config::Config;
use crate::extractor::{Extraction, RecordExtractor, at};
use crate::stats::ObjectStats;

/// Suffixes stripped from the last key segment, in order
const ARCHIVE_SUFFIXES: &[&str] = &[".gz", ".warc"];

/// `crawl-data/CC-NEWS/2024/01/CC-NEWS-…-00000.warc.gz` → `CC-NEWS-…-00000`
pub fn output_base_name(key: &str) -> String {
    let mut name = key.rsplit('/').next().unwrap_or(key);
    for suffix in ARCHIVE_SUFFIXES {
        name = name.strip_suffix(suffix).unwrap_or(name);
    }
    name.to_string()
}

/// Corrupt bytes fail the same way on every download; anything else
/// (truncation, stalls, resets) may be the transport
fn read_error(e: io::Error) -> ObjectError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => ObjectError::Archive(e),
        _ => ObjectError::Fetch(FetchError::Io(e)),
    }
}

/// Run every record of `reader` through the extractor, in archive order.
///
/// `emit` receives each finished line. Malformed archive data is an archive
/// error, other read failures are fetch errors (retryable), `emit` failures
/// are output errors.
pub fn index_records<R: Read>(
    key: &str,
    reader: R,
    extractor: &RecordExtractor,
    mut emit: impl FnMut(&str) -> io::Result<()>,
) -> Result<ObjectStats, ObjectError> {
    let start = Instant::now();
    let mut stats = ObjectStats::new(key);
    let mut archive = ArchiveReader::new(reader);

    while let Some(record) = archive.next_record().map_err(read_error)? {
        stats.records += 1;
        if record.record_type() != RecordType::Response {
            // Dropped unread; the reader skips its content
            stats.skipped += 1;
            continue;
        }
        let record = record.drain().map_err(read_error)?;
        match extractor.extract(key, &record) {
            Extraction::Indexed(entry) => {
                let line = entry
                    .to_line()
                    .map_err(|e| ObjectError::Output(io::Error::other(e)))?;
                emit(&line).map_err(ObjectError::Output)?;
                stats.indexed += 1;
            }
            Extraction::Skipped(reason) if reason.is_malformed() => {
                log::warn!("{}: skipping record, {reason}", at(key, record.position()));
                stats.malformed += 1;
            }
            Extraction::Skipped(_) => stats.skipped += 1,
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// Fetch one object, index it, write the sorted lines to `<base>.cdxj.gz`.
///
/// Nothing is written unless the whole object was read.
pub fn process_object(
    key: &str,
    fetcher: &dyn ObjectFetcher,
    extractor: &RecordExtractor,
    config: &Config,
    pb: &ProgressBar,
) -> Result<ObjectStats, ObjectError> {
    pb.set_message("connecting...");
    pb.set_position(0);
    let stream = fetcher.get(key, None)?;
    if let Some(total) = stream.total_bytes {
        upgrade_to_bar(pb, total);
    }
    pb.set_message("indexing");
    let counter = stream.counter.clone();

    let mut lines = Vec::new();
    let mut stats = index_records(key, stream, extractor, |line| {
        lines.push(line.to_string());
        pb.set_position(counter.load(Ordering::Relaxed));
        Ok(())
    })?;
    stats.bytes = counter.load(Ordering::Relaxed);

    lines.sort_unstable();

    let base = output_base_name(key);
    let mut sink = CdxjSink::new(&config.output_dir, &base, config.compression_level)
        .map_err(ObjectError::Output)?;
    for line in &lines {
        sink.write_line(line).map_err(ObjectError::Output)?;
    }
    sink.finalize().map_err(ObjectError::Output)?;

    Ok(stats)
}

/// Fetch one object (or a byte range of it) and stream unsorted lines to `out`
pub fn stream_object(
    key: &str,
    range: Option<ByteRange>,
    fetcher: &dyn ObjectFetcher,
    extractor: &RecordExtractor,
    out: &mut dyn Write,
) -> Result<ObjectStats, ObjectError> {
    let stream = fetcher.get(key, range)?;
    let counter = stream.counter.clone();
    let mut stats = index_records(key, stream, extractor, |line| out.write_all(line.as_bytes()))?;
    out.flush().map_err(ObjectError::Output)?;
    stats.bytes = counter.load(Ordering::Relaxed);
    Ok(stats)
}
