//! Lock-free work queue for handing archive objects to workers

use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free work queue distributing items to workers.
///
/// Workers call [`next()`](WorkQueue::next) to claim the next item. Items
/// come out in input order, so a single worker sees the original sequence.
pub struct WorkQueue<S> {
    items: Vec<S>,
    cursor: AtomicUsize,
}

impl<S> WorkQueue<S> {
    pub fn new(items: Vec<S>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Create queue, keeping only items that pass the filter (resume support)
    pub fn filtered(items: Vec<S>, keep: impl Fn(&S) -> bool) -> (Self, usize) {
        let total = items.len();
        let kept: Vec<S> = items.into_iter().filter(|s| keep(s)).collect();
        let dropped = total - kept.len();
        log::debug!("{} items in work queue ({dropped} filtered)", kept.len());
        (Self::new(kept), dropped)
    }

    /// Claim the next item, `None` once drained
    pub fn next(&self) -> Option<&S> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i)
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}
