pub mod forwarding;
pub mod load_balancer;
pub mod membership;
pub mod router;
pub mod server;
pub mod transport;
pub mod upstream;

pub use forwarding::{ForwardGroup, ForwardMetricsSnapshot, MessageBuilder, ResponseParser};
pub use load_balancer::Policy;
pub use membership::{BloomFilter, CuckooFilter, GroupMatcher, MembershipSet};
pub use router::{RouteOutcome, Router};
pub use server::{DnsRequestHandler, NextHandler, ServFailNext};
pub use transport::Protocol;
pub use upstream::{ConnectOptions, Proxy, Upstream};
