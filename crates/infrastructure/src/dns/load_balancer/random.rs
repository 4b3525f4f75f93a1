use smallvec::SmallVec;

/// Uniform shuffle of the upstreams on every call.
pub struct RandomPolicy;

impl RandomPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn list<T: Clone>(&self, items: &[T]) -> SmallVec<[T; 16]> {
        let mut list: SmallVec<[T; 16]> = items.iter().cloned().collect();
        match list.len() {
            0 | 1 => {}
            2 => {
                if fastrand::bool() {
                    list.swap(0, 1);
                }
            }
            _ => fastrand::shuffle(&mut list),
        }
        list
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}
