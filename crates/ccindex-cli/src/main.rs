//! ccindex - CDXJ indexer for web archive objects
//!
//! Streams WARC archives from the Common Crawl object store (or a local
//! mirror) and writes one CDXJ line per captured HTTP response.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use ccindex_core::{ProgressContext, SharedProgress, init_logging, request_shutdown};
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "ccindex")]
#[command(about = "CDXJ indexer for web archive objects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./ccindex.toml or ~/.config/ccindex/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Object store base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Read objects from this directory instead of the object store
    #[arg(long, global = true)]
    local_root: Option<PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Attempts per object before it is given up
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Index archive objects into CDXJ
    Index(cmd::index::IndexArgs),
    /// List CC-NEWS archive keys from the monthly manifests
    Toc(cmd::toc::TocArgs),
    /// Download one archive object
    Download(cmd::download::DownloadArgs),
    /// Show current configuration
    Config,
}

impl Cli {
    /// Config file values with command-line overrides applied
    fn effective_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::load()?,
        };
        if let Some(url) = &self.base_url {
            config.store.base_url.clone_from(url);
        }
        if let Some(root) = &self.local_root {
            config.store.local_root = Some(root.clone());
        }
        if let Some(secs) = self.read_timeout {
            config.http.read_timeout = secs;
        }
        if let Some(n) = self.max_attempts {
            config.retry.max_attempts = n;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    init_logging(is_tty && !cli.debug, cli.debug, multi);

    match run(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, progress: &SharedProgress) -> Result<ExitCode> {
    let config = cli.effective_config()?;

    match cli.command {
        Command::Index(args) => {
            setup_signal_handler();
            cmd::index::run(args, &config, progress)
        }
        Command::Toc(args) => cmd::toc::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Download(args) => {
            cmd::download::run(args, &config, progress).map(|()| ExitCode::SUCCESS)
        }
        Command::Config => {
            cmd::config::show(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn setup_signal_handler() {
    // First signal: set graceful shutdown flag
    // Second signal: force exit
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        // SAFETY: the handler only swaps an atomic and exits
        let registered = unsafe {
            signal_hook::low_level::register(signal, || {
                if request_shutdown() {
                    std::process::exit(130);
                }
            })
        };
        if let Err(e) = registered {
            log::warn!("Failed to register handler for signal {signal}: {e}");
        }
    }
}
