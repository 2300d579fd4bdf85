//! Shared counters exported by the filter transform.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Cumulative number of rows removed by one or more filter transforms.
///
/// The handle is cheap to clone; every clone points at the same counter, so
/// parallel copies of a pipeline can share one total. Filtering only ever
/// adds to it.
#[derive(Debug, Default, Clone)]
pub struct RowsFilteredCounter {
    rows: Arc<AtomicU64>,
}

impl RowsFilteredCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, rows: usize) {
        if rows > 0 {
            self.rows.fetch_add(rows as u64, Ordering::Relaxed);
        }
    }

    /// Current cumulative total.
    pub fn get(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }
}

impl From<Arc<AtomicU64>> for RowsFilteredCounter {
    fn from(rows: Arc<AtomicU64>) -> Self {
        Self { rows }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn clones_share_total_across_threads() {
        let counter = RowsFilteredCounter::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.add(3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker");
        }
        assert_eq!(counter.get(), 12_000);
    }

    #[test]
    fn wraps_external_atomic() {
        let raw = Arc::new(AtomicU64::new(5));
        let counter = RowsFilteredCounter::from(Arc::clone(&raw));
        counter.add(7);
        counter.add(0);
        assert_eq!(raw.load(Ordering::Relaxed), 12);
    }
}
