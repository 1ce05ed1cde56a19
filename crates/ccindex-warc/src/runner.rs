//! Batch and single-object drivers

use std::io::{self, BufRead, Write};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context;
use ccindex_core::sink::output_path;
use ccindex_core::{
    Backoff, ByteRange, ObjectError, ObjectFetcher, ObjectOutcome, ProgressContext, WorkQueue,
    cleanup_tmp_files, is_shutdown_requested, retry_with_budget,
};

use crate::config::Config;
use crate::extractor::RecordExtractor;
use crate::stats::{BatchSummary, ObjectStats};
use crate::worker::{output_base_name, process_object, stream_object};

/// Object keys, one per line; surrounding whitespace trimmed, blank lines ignored
pub fn read_keys(input: impl BufRead) -> io::Result<Vec<String>> {
    let mut keys = Vec::new();
    for line in input.lines() {
        let line = line?;
        let key = line.trim();
        if !key.is_empty() {
            keys.push(key.to_string());
        }
    }
    Ok(keys)
}

/// Index every key into `config.output_dir`, pacing retries with a fresh
/// wait budget built from `config.retry`.
pub fn run_batch(
    keys: Vec<String>,
    fetcher: &dyn ObjectFetcher,
    extractor: &RecordExtractor,
    config: &Config,
    progress: &ProgressContext,
) -> anyhow::Result<BatchSummary> {
    let budget = Mutex::new(config.retry.budget());
    log::debug!("wait budget: {}", config.retry.budget());
    run_batch_with(
        keys,
        fetcher,
        extractor,
        config,
        progress,
        &budget,
        std::thread::sleep,
    )
}

/// [`run_batch`] with the budget and the sleep supplied by the caller.
///
/// One budget is shared by all workers; each object gets its own bounded
/// retry loop. A failed object is logged and skipped, never fatal.
pub fn run_batch_with<B: Backoff + Send>(
    keys: Vec<String>,
    fetcher: &dyn ObjectFetcher,
    extractor: &RecordExtractor,
    config: &Config,
    progress: &ProgressContext,
    budget: &Mutex<B>,
    sleep: impl Fn(Duration) + Sync,
) -> anyhow::Result<BatchSummary> {
    let start = Instant::now();

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    cleanup_tmp_files(&config.output_dir).context("Failed to clean stale tmp files")?;

    let total = keys.len();
    let indexed: Vec<(usize, String)> = keys.into_iter().enumerate().collect();
    let (queue, skipped_existing) = if config.skip_existing {
        WorkQueue::filtered(indexed, |(_, key)| {
            !output_path(&config.output_dir, &output_base_name(key)).exists()
        })
    } else {
        (WorkQueue::new(indexed), 0)
    };
    if skipped_existing > 0 {
        log::info!("{skipped_existing} objects already indexed, skipping");
    }

    let workers = config.workers.max(1);
    log::info!(
        "Indexing {} objects with {} worker{}",
        queue.total(),
        workers,
        if workers == 1 { "" } else { "s" }
    );

    let completed: Mutex<Vec<ObjectStats>> = Mutex::new(Vec::new());
    let failed: Mutex<Vec<(usize, String)>> = Mutex::new(Vec::new());
    let is_tty = progress.is_tty();

    rayon::scope(|s| {
        for _ in 0..workers {
            s.spawn(|_| {
                while let Some((idx, key)) = queue.next() {
                    if is_shutdown_requested() {
                        break;
                    }
                    let pb = progress.object_bar(key);
                    let outcome = retry_with_budget(
                        key,
                        budget,
                        config.retry.max_attempts,
                        &pb,
                        &sleep,
                        || process_object(key, fetcher, extractor, config, &pb),
                    );
                    pb.finish_and_clear();
                    match outcome {
                        ObjectOutcome::Completed(stats) => {
                            if !is_tty {
                                stats.log();
                            }
                            lock(&completed).push(stats);
                        }
                        ObjectOutcome::PermanentFailure(_) => {
                            lock(&failed).push((*idx, key.clone()));
                        }
                    }
                }
            });
        }
    });

    let mut failed = failed.into_inner().unwrap_or_else(PoisonError::into_inner);
    failed.sort_unstable();

    let mut summary = BatchSummary {
        total,
        skipped_existing,
        failed_keys: failed.into_iter().map(|(_, key)| key).collect(),
        interrupted: is_shutdown_requested(),
        ..Default::default()
    };
    for stats in completed
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
    {
        summary.add(stats);
    }
    summary.elapsed = start.elapsed();

    if summary.interrupted {
        log::warn!(
            "Shutdown requested, {} objects not attempted",
            summary.not_attempted()
        );
    }

    Ok(summary)
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Index one object (or a byte range of it) straight to `out`, unsorted.
///
/// No retry: the first fetch or read error is returned to the caller.
pub fn run_single(
    key: &str,
    range: Option<ByteRange>,
    fetcher: &dyn ObjectFetcher,
    extractor: &RecordExtractor,
    out: &mut dyn Write,
) -> Result<ObjectStats, ObjectError> {
    match range {
        Some(r) => log::debug!("{key}: indexing range {r}"),
        None => log::debug!("{key}: indexing whole object"),
    }
    let stats = stream_object(key, range, fetcher, extractor, out)?;
    stats.log();
    Ok(stats)
}
