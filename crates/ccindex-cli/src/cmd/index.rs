//! `ccindex index` - batch or single-object CDXJ indexing

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use ccindex_core::{ByteRange, ObjectFetcher, SharedProgress};
use ccindex_warc::{RecordExtractor, read_keys, run_batch, run_single};
use clap::Args;

use super::{build_extractor, build_fetcher};
use crate::config::Config;

/// Reads object keys from stdin
const STDIN_KEYS: &str = "-";

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Archive object key, or "-" to index every key listed on stdin
    #[arg(short, long, default_value = STDIN_KEYS)]
    pub key_name: String,

    /// Start of the byte range to index (single object only)
    #[arg(long, requires = "length")]
    pub offset: Option<u64>,

    /// Length of the byte range to index (single object only)
    #[arg(long, requires = "offset", value_parser = clap::value_parser!(u64).range(1..))]
    pub length: Option<u64>,

    /// Output directory for batch index files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of objects indexed concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Skip objects whose index file already exists
    #[arg(long)]
    pub skip_existing: bool,

    /// Gzip compression level (0-9)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub compression_level: Option<u32>,
}

impl IndexArgs {
    pub fn range(&self) -> Option<ByteRange> {
        self.offset
            .zip(self.length)
            .map(|(offset, length)| ByteRange::new(offset, length))
    }
}

pub fn run(args: IndexArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    if args.key_name == STDIN_KEYS && args.range().is_some() {
        anyhow::bail!("--offset/--length need a single object key (-k)");
    }

    let fetcher = build_fetcher(config)?;
    let extractor = build_extractor(config);

    if args.key_name == STDIN_KEYS {
        index_batch(args, config, fetcher.as_ref(), &extractor, progress)
    } else {
        index_single(&args, fetcher.as_ref(), &extractor)
    }
}

fn index_batch(
    args: IndexArgs,
    config: &Config,
    fetcher: &dyn ObjectFetcher,
    extractor: &RecordExtractor,
    progress: &SharedProgress,
) -> Result<ExitCode> {
    let keys = read_keys(io::stdin().lock()).context("Failed to read object keys from stdin")?;

    let max_workers = config.workers.max.max(1);
    let workers = args
        .workers
        .unwrap_or(config.workers.default)
        .clamp(1, max_workers);
    let index_config = ccindex_warc::Config {
        output_dir: args
            .output
            .unwrap_or_else(|| config.output.default_dir.clone()),
        retry: config.retry.policy(),
        workers,
        skip_existing: args.skip_existing,
        compression_level: args
            .compression_level
            .unwrap_or(config.output.compression_level),
    };

    log::info!("Indexing {} objects", keys.len());
    log::info!("  Output: {}", index_config.output_dir.display());

    let summary = run_batch(keys, fetcher, extractor, &index_config, progress)?;

    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }

    // Failed objects are reported, not fatal
    if summary.interrupted {
        Ok(ExitCode::from(130))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn index_single(
    args: &IndexArgs,
    fetcher: &dyn ObjectFetcher,
    extractor: &RecordExtractor,
) -> Result<ExitCode> {
    let mut out = BufWriter::new(io::stdout().lock());
    run_single(&args.key_name, args.range(), fetcher, extractor, &mut out)
        .with_context(|| format!("Failed to index {}", args.key_name))?;
    Ok(ExitCode::SUCCESS)
}
