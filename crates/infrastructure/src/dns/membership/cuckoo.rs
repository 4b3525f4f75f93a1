use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

const BUCKET_SIZE: usize = 4;
const MAX_KICKS: usize = 500;
const TARGET_LOAD: f64 = 0.95;
const EMPTY: u16 = 0;

/// Fixed-capacity cuckoo filter with 16-bit fingerprints.
///
/// Once the table is full an insertion returns false and leaves every
/// previously stored fingerprint in place.
#[derive(Debug, Clone)]
pub struct CuckooFilter {
    buckets: Vec<[u16; BUCKET_SIZE]>,
    mask: usize,
    len: usize,
}

impl CuckooFilter {
    pub fn new(capacity: usize) -> Self {
        let wanted = (capacity.max(1) as f64 / TARGET_LOAD / BUCKET_SIZE as f64).ceil() as usize;
        let num_buckets = wanted.max(1).next_power_of_two();
        Self {
            buckets: vec![[EMPTY; BUCKET_SIZE]; num_buckets],
            mask: num_buckets - 1,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len() * BUCKET_SIZE
    }

    pub fn contains(&self, item: &str) -> bool {
        let (fp, i1) = self.locate(item);
        let i2 = self.alt_index(i1, fp);
        self.buckets[i1].contains(&fp) || self.buckets[i2].contains(&fp)
    }

    /// Adds `item`. Returns false when the filter is full and the item could
    /// not be placed.
    pub fn insert(&mut self, item: &str) -> bool {
        let (fp, i1) = self.locate(item);
        let i2 = self.alt_index(i1, fp);

        if self.buckets[i1].contains(&fp) || self.buckets[i2].contains(&fp) {
            return true;
        }
        if self.place(i1, fp) || self.place(i2, fp) {
            self.len += 1;
            return true;
        }

        let mut index = if fastrand::bool() { i1 } else { i2 };
        let mut victim = fp;
        let mut path = Vec::with_capacity(MAX_KICKS);

        for _ in 0..MAX_KICKS {
            let slot = fastrand::usize(..BUCKET_SIZE);
            std::mem::swap(&mut self.buckets[index][slot], &mut victim);
            path.push((index, slot));

            index = self.alt_index(index, victim);
            if self.place(index, victim) {
                self.len += 1;
                return true;
            }
        }

        // Undo the evictions so nothing stored before is lost.
        for (index, slot) in path.into_iter().rev() {
            std::mem::swap(&mut self.buckets[index][slot], &mut victim);
        }
        false
    }

    fn place(&mut self, index: usize, fp: u16) -> bool {
        match self.buckets[index].iter_mut().find(|slot| **slot == EMPTY) {
            Some(slot) => {
                *slot = fp;
                true
            }
            None => false,
        }
    }

    fn locate(&self, item: &str) -> (u16, usize) {
        let mut hasher = FxHasher::default();
        item.hash(&mut hasher);
        let hash = hasher.finish();
        let fp = match (hash >> 48) as u16 {
            EMPTY => 1,
            fp => fp,
        };
        (fp, (hash as usize) & self.mask)
    }

    fn alt_index(&self, index: usize, fp: u16) -> usize {
        let fp_hash = (fp as u64).wrapping_mul(0x5bd1_e995) as usize;
        (index ^ fp_hash) & self.mask
    }
}
