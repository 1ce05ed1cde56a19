//! `ccindex toc` - list CC-NEWS archive keys

use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use ccindex_warc::manifest::{current_month, list_archives};
use clap::Args;

use super::build_fetcher;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct TocArgs {
    /// Key prefix of the crawl
    #[arg(long)]
    pub prefix: Option<String>,

    /// First year to list
    #[arg(long)]
    pub first_year: Option<i32>,
}

pub fn run(args: TocArgs, config: &Config) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let prefix = args.prefix.unwrap_or_else(|| config.toc.prefix.clone());
    let first_year = args.first_year.unwrap_or(config.toc.first_year);
    let until = current_month();

    log::info!(
        "Listing {prefix} from {first_year} through {}-{:02}",
        until.0,
        until.1
    );

    let mut out = BufWriter::new(io::stdout().lock());
    let count = list_archives(fetcher.as_ref(), &prefix, first_year, until, |key| {
        writeln!(out, "{key}")
    })
    .with_context(|| format!("Failed to list archives under {prefix}"))?;
    out.flush().context("Failed to write listing")?;

    log::info!("{count} archives listed");
    Ok(())
}
