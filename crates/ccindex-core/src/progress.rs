//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif bar per archive object in flight.
//! Non-TTY mode: hidden bars, logs are the only progress indicator.

use std::io::IsTerminal;
use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Width of the object name column
const PREFIX_WIDTH: usize = 28;

/// Per-object byte bar
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<28.dim} {bar:30.green/dim} {binary_bytes:>7}/{binary_total_bytes:7} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Pending style, shown before the object size is known
fn pending_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<28.dim} {binary_bytes:>7} {wide_msg:.dim}")
        .expect("invalid template")
}

/// Switch a pending bar to a byte bar once the object size is known.
pub fn upgrade_to_bar(pb: &ProgressBar, total: u64) {
    pb.set_length(total);
    pb.set_style(bar_style());
}

/// Archive keys share long prefixes; keep the distinctive tail.
fn display_name(name: &str) -> &str {
    let file = name.rsplit('/').next().unwrap_or(name);
    let skip = file.chars().count().saturating_sub(PREFIX_WIDTH);
    match file.char_indices().nth(skip) {
        Some((i, _)) => &file[i..],
        None => file,
    }
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
        }
    }

    /// Context that never draws, for tests and piped runs
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: false,
        }
    }

    /// Create a bar for one archive object (hidden outside a TTY).
    pub fn object_bar(&self, key: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }

        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(pending_style());
        pb.set_prefix(display_name(key).to_string());
        pb
    }

    /// Print a line above managed progress bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
