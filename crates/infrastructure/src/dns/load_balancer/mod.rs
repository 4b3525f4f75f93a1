pub mod policy;
pub mod random;
pub mod round_robin;
pub mod sequential;

pub use policy::Policy;
pub use random::RandomPolicy;
pub use round_robin::RoundRobinPolicy;
pub use sequential::SequentialPolicy;
