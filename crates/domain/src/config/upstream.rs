use serde::{Deserialize, Serialize};

/// Order in which a group's upstreams are tried.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamPolicy {
    #[default]
    Random,

    RoundRobin,

    Sequential,
}

impl UpstreamPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::RoundRobin => "round_robin",
            Self::Sequential => "sequential",
        }
    }
}

/// Set implementation backing a group's `rules`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
    #[default]
    Bloom,

    Cuckoo,

    Exact,
}

impl MembershipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bloom => "bloom",
            Self::Cuckoo => "cuckoo",
            Self::Exact => "exact",
        }
    }
}
