//! Per-object and per-run statistics.
//!
//! - Object level: [`ObjectStats`], logged as each object completes
//! - Run level: [`BatchSummary`], logged or printed as a table at the end

use std::time::Duration;

use ccindex_core::progress::fmt_num;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

/// Counters for one archive object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStats {
    pub key: String,
    /// Records of any type seen
    pub records: usize,
    /// Index lines written
    pub indexed: usize,
    /// Records of other types (request, metadata, ...)
    pub skipped: usize,
    /// Response records dropped for missing or broken headers
    pub malformed: usize,
    /// Compressed bytes read from the store
    pub bytes: u64,
    pub elapsed: Duration,
}

impl ObjectStats {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    pub fn log(&self) {
        log::info!(
            "{}: {} lines from {} records ({} skipped, {} malformed) [{:.1}s]",
            self.key,
            fmt_num(self.indexed),
            fmt_num(self.records),
            fmt_num(self.skipped),
            self.malformed,
            self.elapsed.as_secs_f64()
        );
    }
}

/// Outcome of a whole batch run
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Keys handed to the run (before skipping existing outputs)
    pub total: usize,
    pub completed: usize,
    /// Keys given up after exhausting retries, in input order
    pub failed_keys: Vec<String>,
    /// Keys whose output already existed
    pub skipped_existing: usize,
    pub records: usize,
    pub indexed: usize,
    pub malformed: usize,
    pub bytes: u64,
    pub elapsed: Duration,
    /// Stopped early on SIGINT/SIGTERM
    pub interrupted: bool,
}

impl BatchSummary {
    pub fn add(&mut self, stats: &ObjectStats) {
        self.completed += 1;
        self.records += stats.records;
        self.indexed += stats.indexed;
        self.malformed += stats.malformed;
        self.bytes += stats.bytes;
    }

    pub fn failed(&self) -> usize {
        self.failed_keys.len()
    }

    /// Objects neither completed, failed nor skipped (interrupted runs)
    pub fn not_attempted(&self) -> usize {
        self.total
            .saturating_sub(self.completed + self.failed() + self.skipped_existing)
    }

    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Index run")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Objects"),
            Cell::new(format!(
                "{}/{} ({} failed, {} existing)",
                self.completed,
                self.total,
                self.failed(),
                self.skipped_existing
            )),
        ]);
        table.add_row(vec![Cell::new("Records"), Cell::new(fmt_num(self.records))]);
        table.add_row(vec![
            Cell::new("Index lines").fg(Color::Green),
            Cell::new(fmt_num(self.indexed)).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Malformed headers"),
            Cell::new(fmt_num(self.malformed)),
        ]);
        table.add_row(vec![
            Cell::new("Downloaded"),
            Cell::new(format!("{:.1} MiB", self.bytes as f64 / (1024.0 * 1024.0))),
        ]);
        table.add_row(vec![
            Cell::new("Time"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]);
        for key in &self.failed_keys {
            table.add_row(vec![Cell::new("Failed").fg(Color::Red), Cell::new(key)]);
        }

        format!("\n{table}")
    }

    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    /// Log summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "Objects: {}/{} completed ({} failed, {} already indexed)",
            self.completed,
            self.total,
            self.failed(),
            self.skipped_existing
        );
        log::info!(
            "Index lines: {} from {} records ({} malformed)",
            fmt_num(self.indexed),
            fmt_num(self.records),
            self.malformed
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        for key in &self.failed_keys {
            log::error!("Permanently failed: {key}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(indexed: usize) -> ObjectStats {
        ObjectStats {
            records: indexed * 3,
            indexed,
            skipped: indexed * 2,
            malformed: 1,
            bytes: 1024,
            ..ObjectStats::new("k")
        }
    }

    #[test]
    fn summary_accumulates() {
        let mut summary = BatchSummary {
            total: 4,
            ..Default::default()
        };
        summary.add(&stats(10));
        summary.add(&stats(5));
        summary.failed_keys.push("bad".to_string());
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.indexed, 15);
        assert_eq!(summary.records, 45);
        assert_eq!(summary.malformed, 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.not_attempted(), 1);
    }

    #[test]
    fn table_names_failed_keys() {
        let summary = BatchSummary {
            total: 1,
            failed_keys: vec!["crawl/b.warc.gz".to_string()],
            ..Default::default()
        };
        let table = summary.format_table();
        assert!(table.contains("crawl/b.warc.gz"));
        assert!(table.contains("0/1"));
    }

    #[test]
    fn log_does_not_panic() {
        BatchSummary::default().log();
        stats(1).log();
    }
}
