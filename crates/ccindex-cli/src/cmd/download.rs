//! `ccindex download` - copy one archive object to disk

use std::path::PathBuf;

use anyhow::{Context, Result};
use ccindex_core::SharedProgress;
use ccindex_core::progress::fmt_num;
use ccindex_warc::download::download_object;
use clap::Args;

use super::build_fetcher;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Archive object key
    pub key: String,

    /// Output directory (the key path is recreated below it)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: DownloadArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let output_dir = args
        .output
        .unwrap_or_else(|| config.output.default_dir.clone());

    let pb = progress.object_bar(&args.key);
    let result = download_object(&args.key, fetcher.as_ref(), &output_dir, &pb);
    pb.finish_and_clear();

    let (path, bytes) = result.with_context(|| format!("Failed to download {}", args.key))?;
    log::info!(
        "{}: {} bytes written to {}",
        args.key,
        fmt_num(bytes as usize),
        path.display()
    );
    Ok(())
}
