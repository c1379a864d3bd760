//! Lock-free work queue for distributing candidate titles across workers

use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free work queue distributing items to workers.
///
/// Workers call [`next()`](WorkQueue::next) to atomically claim the next
/// item. Supports optional filtering at construction time (e.g. dropping
/// titles already settled in the cache).
pub struct WorkQueue<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> WorkQueue<T> {
    /// Create queue from all items (no filtering)
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Create queue, keeping only items that pass the filter
    pub fn filtered(items: Vec<T>, keep: impl Fn(&T) -> bool) -> Self {
        let filtered: Vec<T> = items.into_iter().filter(|t| keep(t)).collect();
        log::debug!("{} items in work queue", filtered.len());
        Self {
            items: filtered,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Get next item to process (lock-free)
    pub fn next(&self) -> Option<&T> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i)
    }

    /// Total items in queue
    pub fn total(&self) -> usize {
        self.items.len()
    }
}
