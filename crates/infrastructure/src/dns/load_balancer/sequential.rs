use smallvec::SmallVec;

/// Upstreams in configured order, every time.
pub struct SequentialPolicy;

impl SequentialPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn list<T: Clone>(&self, items: &[T]) -> SmallVec<[T; 16]> {
        items.iter().cloned().collect()
    }
}

impl Default for SequentialPolicy {
    fn default() -> Self {
        Self::new()
    }
}
