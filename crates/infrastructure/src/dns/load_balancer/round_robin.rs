use smallvec::SmallVec;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Rotates the starting upstream on every call.
pub struct RoundRobinPolicy {
    counter: AtomicUsize,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    fn next_index(&self, len: usize) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed) % len
    }

    pub fn list<T: Clone>(&self, items: &[T]) -> SmallVec<[T; 16]> {
        if items.is_empty() {
            return SmallVec::new();
        }
        let start = self.next_index(items.len());
        (0..items.len())
            .map(|i| items[(start + i) % items.len()].clone())
            .collect()
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}
