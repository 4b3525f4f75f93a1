#![allow(dead_code)]
pub mod dns_server_mock;
pub mod mock_upstream;

pub use dns_server_mock::{MockBehavior, MockDnsServer, MOCK_ANSWER};
pub use mock_upstream::{MockUpstream, Step};

use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use splitroute_infrastructure::dns::MessageBuilder;

pub fn query(name: &str) -> Message {
    MessageBuilder::build_query(name, RecordType::A).unwrap()
}
