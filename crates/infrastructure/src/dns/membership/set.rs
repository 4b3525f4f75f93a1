use compact_str::CompactString;
use rustc_hash::FxHashSet;
use splitroute_domain::config::{DEFAULT_BLOOM_CAPACITY, DEFAULT_BLOOM_FP_RATE};
use splitroute_domain::{normalize, MembershipKind};

use super::bloom::BloomFilter;
use super::cuckoo::CuckooFilter;

/// A read-only-once-built set of domain names.
#[derive(Debug, Clone)]
pub enum MembershipSet {
    Exact(FxHashSet<CompactString>),
    Bloom(BloomFilter),
    Cuckoo(CuckooFilter),
}

impl MembershipSet {
    pub fn exact() -> Self {
        MembershipSet::Exact(FxHashSet::default())
    }

    pub fn bloom(capacity: usize, fp_rate: f64) -> Self {
        MembershipSet::Bloom(BloomFilter::new(capacity, fp_rate))
    }

    pub fn cuckoo(capacity: usize) -> Self {
        MembershipSet::Cuckoo(CuckooFilter::new(capacity))
    }

    /// An empty set of the given kind, sized with the rules defaults.
    pub fn with_kind(kind: MembershipKind) -> Self {
        match kind {
            MembershipKind::Bloom => Self::bloom(DEFAULT_BLOOM_CAPACITY, DEFAULT_BLOOM_FP_RATE),
            MembershipKind::Cuckoo => Self::cuckoo(DEFAULT_BLOOM_CAPACITY),
            MembershipKind::Exact => Self::exact(),
        }
    }

    /// Adds a name. Returns false when the name is malformed, already
    /// present, or (cuckoo only) did not fit.
    pub fn add(&mut self, name: &str) -> bool {
        let name = normalize(name);
        if !is_plausible_name(&name) {
            return false;
        }
        match self {
            MembershipSet::Exact(set) => set.insert(CompactString::from(name)),
            MembershipSet::Bloom(bloom) => bloom.insert(&name),
            MembershipSet::Cuckoo(cuckoo) => cuckoo.insert(&name),
        }
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        let name = normalize(name);
        is_plausible_name(&name) && self.contains_normalized(&name)
    }

    /// Membership test for a name already in normalized form.
    #[inline]
    pub fn contains_normalized(&self, name: &str) -> bool {
        match self {
            MembershipSet::Exact(set) => set.contains(name),
            MembershipSet::Bloom(bloom) => bloom.contains(name),
            MembershipSet::Cuckoo(cuckoo) => cuckoo.contains(name),
        }
    }

    pub fn approximate_len(&self) -> usize {
        match self {
            MembershipSet::Exact(set) => set.len(),
            MembershipSet::Bloom(bloom) => bloom.approximate_len(),
            MembershipSet::Cuckoo(cuckoo) => cuckoo.len(),
        }
    }

    pub fn kind(&self) -> MembershipKind {
        match self {
            MembershipSet::Exact(_) => MembershipKind::Exact,
            MembershipSet::Bloom(_) => MembershipKind::Bloom,
            MembershipSet::Cuckoo(_) => MembershipKind::Cuckoo,
        }
    }
}

/// Rejects the obvious non-names: empty strings, comment lines, URLs and
/// anything with whitespace.
pub fn is_plausible_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('#')
        && !name.starts_with('!')
        && !name
            .bytes()
            .any(|b| b.is_ascii_whitespace() || b == b'/' || b == b'#')
}
