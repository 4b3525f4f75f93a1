use rustc_hash::FxHasher;
use splitroute_domain::DomainError;
use std::hash::{Hash, Hasher};

const BLOB_MAGIC: &[u8; 4] = b"SRBF";
const BLOB_VERSION: u8 = 1;
const BLOB_HEADER_LEN: usize = 4 + 1 + 4 + 8 + 8;
const MAX_HASHES: usize = 32;

/// Bit-array bloom filter over domain names, sized for an expected number
/// of items and a target false-positive rate.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    words: Vec<u64>,
    mask: u64,
    num_hashes: usize,
    items: u64,
}

impl BloomFilter {
    pub fn new(capacity: usize, fp_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let fp_rate = if fp_rate > 0.0 && fp_rate < 1.0 {
            fp_rate
        } else {
            0.001
        };
        let num_bits = Self::optimal_num_bits(capacity, fp_rate);
        let num_hashes = Self::optimal_num_hashes(capacity, num_bits);
        Self {
            words: vec![0; num_bits.div_ceil(64)],
            mask: (num_bits as u64) - 1,
            num_hashes,
            items: 0,
        }
    }

    /// Sets the bits for `item`. Returns false when every bit was already
    /// set, which for a fresh name means a false positive.
    pub fn insert(&mut self, item: &str) -> bool {
        let (h1, h2) = Self::double_hash(item);
        let mut newly_set = false;
        for i in 0..self.num_hashes as u64 {
            let idx = Self::nth_hash(h1, h2, i, self.mask);
            let bit = 1u64 << (idx % 64);
            let word = &mut self.words[idx / 64];
            if *word & bit == 0 {
                *word |= bit;
                newly_set = true;
            }
        }
        if newly_set {
            self.items += 1;
        }
        newly_set
    }

    #[inline]
    pub fn contains(&self, item: &str) -> bool {
        let (h1, h2) = Self::double_hash(item);
        (0..self.num_hashes as u64).all(|i| {
            let idx = Self::nth_hash(h1, h2, i, self.mask);
            self.words[idx / 64] & (1u64 << (idx % 64)) != 0
        })
    }

    /// Number of insertions that changed the filter.
    pub fn approximate_len(&self) -> usize {
        self.items as usize
    }

    pub fn num_bits(&self) -> usize {
        (self.mask + 1) as usize
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Serializes the filter into the `cache+` blob format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOB_HEADER_LEN + self.words.len() * 8);
        out.extend_from_slice(BLOB_MAGIC);
        out.push(BLOB_VERSION);
        out.extend_from_slice(&(self.num_hashes as u32).to_le_bytes());
        out.extend_from_slice(&self.items.to_le_bytes());
        out.extend_from_slice(&(self.mask + 1).to_le_bytes());
        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DomainError> {
        let invalid = |reason: &str| DomainError::RuleSource(format!("bloom blob: {reason}"));

        if bytes.len() < BLOB_HEADER_LEN {
            return Err(invalid("truncated header"));
        }
        if &bytes[..4] != BLOB_MAGIC {
            return Err(invalid("bad magic"));
        }
        if bytes[4] != BLOB_VERSION {
            return Err(invalid(&format!("unsupported version {}", bytes[4])));
        }

        let num_hashes = u32::from_le_bytes(read_array(&bytes[5..9])) as usize;
        let items = u64::from_le_bytes(read_array(&bytes[9..17]));
        let num_bits = u64::from_le_bytes(read_array(&bytes[17..25]));

        if num_bits == 0 || !num_bits.is_power_of_two() {
            return Err(invalid("inconsistent parameters"));
        }
        if !(1..=MAX_HASHES).contains(&num_hashes) {
            return Err(invalid(&format!("hash count {num_hashes} out of range")));
        }
        let num_words = (num_bits as usize).div_ceil(64);
        let body = &bytes[BLOB_HEADER_LEN..];
        if body.len() != num_words * 8 {
            return Err(invalid("body length does not match bit count"));
        }

        let words = body
            .chunks_exact(8)
            .map(|chunk| u64::from_le_bytes(read_array(chunk)))
            .collect();

        Ok(Self {
            words,
            mask: num_bits - 1,
            num_hashes,
            items,
        })
    }

    #[inline]
    fn double_hash<K: Hash + ?Sized>(key: &K) -> (u64, u64) {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        let h1 = hasher.finish();
        let h2 = h1.wrapping_mul(0x517cc1b727220a95).rotate_right(17);
        (h1, h2)
    }

    #[inline]
    fn nth_hash(h1: u64, h2: u64, n: u64, mask: u64) -> usize {
        (h1.wrapping_add(n.wrapping_mul(h2)) & mask) as usize
    }

    fn optimal_num_bits(capacity: usize, fp_rate: f64) -> usize {
        let n = capacity as f64;
        let p = fp_rate;
        let m = (-(n * p.ln()) / (2.0_f64.ln().powi(2))).ceil() as usize;
        m.max(64).next_power_of_two()
    }

    fn optimal_num_hashes(capacity: usize, num_bits: usize) -> usize {
        let n = capacity as f64;
        let m = num_bits as f64;
        (((m / n) * 2.0_f64.ln()).ceil() as usize).clamp(1, MAX_HASHES)
    }
}

fn read_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&slice[..N]);
    out
}
