use smallvec::SmallVec;
use splitroute_domain::UpstreamPolicy;

use super::random::RandomPolicy;
use super::round_robin::RoundRobinPolicy;
use super::sequential::SequentialPolicy;

/// Orders a group's upstreams for one query. Never mutates the pool.
pub enum Policy {
    Random(RandomPolicy),
    RoundRobin(RoundRobinPolicy),
    Sequential(SequentialPolicy),
}

impl Policy {
    pub fn from_config(policy: UpstreamPolicy) -> Self {
        match policy {
            UpstreamPolicy::Random => Policy::Random(RandomPolicy::new()),
            UpstreamPolicy::RoundRobin => Policy::RoundRobin(RoundRobinPolicy::new()),
            UpstreamPolicy::Sequential => Policy::Sequential(SequentialPolicy::new()),
        }
    }

    #[inline]
    pub fn list<T: Clone>(&self, items: &[T]) -> SmallVec<[T; 16]> {
        match self {
            Policy::Random(p) => p.list(items),
            Policy::RoundRobin(p) => p.list(items),
            Policy::Sequential(p) => p.list(items),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Policy::Random(_) => "random",
            Policy::RoundRobin(_) => "round_robin",
            Policy::Sequential(_) => "sequential",
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::Random(RandomPolicy::new())
    }
}
