pub mod bloom;
pub mod cuckoo;
pub mod matcher;
pub mod set;

pub use bloom::BloomFilter;
pub use cuckoo::CuckooFilter;
pub use matcher::GroupMatcher;
pub use set::{is_plausible_name, MembershipSet};
