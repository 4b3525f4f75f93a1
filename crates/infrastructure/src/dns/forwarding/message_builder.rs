//! DNS Message Builder
//!
//! Constructs the messages the forwarder originates itself: health probes,
//! bootstrap lookups and the error replies sent back to clients.

use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::opt::{ClientSubnet as EdnsClientSubnet, EdnsOption};
use hickory_proto::rr::{Name, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use splitroute_domain::{ClientSubnet, DomainError};
use std::str::FromStr;

/// Payload size advertised when the forwarder adds an OPT record.
const DEFAULT_EDNS_PAYLOAD: u16 = 1232;

pub struct MessageBuilder;

impl MessageBuilder {
    /// A recursive query for `domain` with a random ID.
    pub fn build_query(domain: &str, record_type: RecordType) -> Result<Message, DomainError> {
        let name = Name::from_str(domain).map_err(|e| {
            DomainError::InvalidDomainName(format!("Invalid domain '{}': {}", domain, e))
        })?;

        let mut message = Message::new();
        message
            .set_id(fastrand::u16(..))
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(name, record_type));
        Ok(message)
    }

    /// The liveness probe: `. IN NS`.
    pub fn health_check_query(recursion_desired: bool) -> Message {
        let mut message = Message::new();
        message
            .set_id(fastrand::u16(..))
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(recursion_desired)
            .add_query(Query::query(Name::root(), RecordType::NS));
        message
    }

    /// A reply to `query` carrying only its question and `rcode`.
    pub fn error_response(query: &Message, rcode: ResponseCode) -> Message {
        let mut response = Message::error_msg(query.id(), query.op_code(), rcode);
        response
            .set_recursion_desired(query.recursion_desired())
            .add_queries(query.queries().iter().cloned());
        response
    }

    pub fn format_error(query: &Message) -> Message {
        Self::error_response(query, ResponseCode::FormErr)
    }

    /// The header and question of `response` with TC set, for replies too
    /// large for the client's UDP buffer.
    pub fn truncated_response(response: &Message) -> Message {
        let mut truncated = Message::new();
        truncated
            .set_id(response.id())
            .set_message_type(MessageType::Response)
            .set_op_code(response.op_code())
            .set_response_code(response.response_code())
            .set_recursion_desired(response.recursion_desired())
            .set_recursion_available(response.recursion_available())
            .set_truncated(true)
            .add_queries(response.queries().iter().cloned());
        truncated
    }

    /// Adds (or replaces) the EDNS0 CLIENT-SUBNET option, creating the OPT
    /// record when the query has none.
    pub fn attach_client_subnet(query: &mut Message, subnet: &ClientSubnet) {
        let edns = query.extensions_mut().get_or_insert_with(|| {
            let mut edns = Edns::new();
            edns.set_max_payload(DEFAULT_EDNS_PAYLOAD);
            edns
        });
        edns.options_mut().insert(EdnsOption::Subnet(EdnsClientSubnet::new(
            subnet.addr,
            subnet.source_prefix,
            0,
        )));
    }

    pub fn serialize_message(message: &Message) -> Result<Vec<u8>, DomainError> {
        message
            .to_vec()
            .map_err(|e| DomainError::InvalidDnsResponse(format!("Failed to serialize message: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::opt::EdnsCode;

    fn query() -> Message {
        MessageBuilder::build_query("www.example.com.", RecordType::A).unwrap()
    }

    #[test]
    fn health_probe_asks_root_ns() {
        let probe = MessageBuilder::health_check_query(true);
        assert!(probe.recursion_desired());
        assert_eq!(probe.queries().len(), 1);
        assert!(probe.queries()[0].name().is_root());
        assert_eq!(probe.queries()[0].query_type(), RecordType::NS);

        assert!(!MessageBuilder::health_check_query(false).recursion_desired());
    }

    #[test]
    fn error_response_mirrors_the_query() {
        let query = query();
        let reply = MessageBuilder::error_response(&query, ResponseCode::ServFail);
        assert_eq!(reply.id(), query.id());
        assert_eq!(reply.message_type(), MessageType::Response);
        assert_eq!(reply.response_code(), ResponseCode::ServFail);
        assert_eq!(reply.queries(), query.queries());
        assert!(reply.recursion_desired());
    }

    #[test]
    fn format_error_sets_formerr() {
        let reply = MessageBuilder::format_error(&query());
        assert_eq!(reply.response_code(), ResponseCode::FormErr);
    }

    #[test]
    fn client_subnet_is_added_and_replaced() {
        let mut query = query();
        assert!(query.extensions().is_none());

        let first = ClientSubnet {
            addr: "1.2.3.0".parse().unwrap(),
            source_prefix: 24,
        };
        MessageBuilder::attach_client_subnet(&mut query, &first);
        let second = ClientSubnet {
            addr: "10.0.0.0".parse().unwrap(),
            source_prefix: 8,
        };
        MessageBuilder::attach_client_subnet(&mut query, &second);

        let edns = query.extensions().as_ref().unwrap();
        let option = edns.options().get(EdnsCode::Subnet).unwrap();
        let expected = EdnsOption::Subnet(EdnsClientSubnet::new(second.addr, 8, 0));
        assert_eq!(option, &expected);
    }

    #[test]
    fn client_subnet_survives_the_wire() {
        let mut query = query();
        let subnet = ClientSubnet {
            addr: "1.2.3.0".parse().unwrap(),
            source_prefix: 24,
        };
        MessageBuilder::attach_client_subnet(&mut query, &subnet);

        let bytes = MessageBuilder::serialize_message(&query).unwrap();
        let decoded = Message::from_vec(&bytes).unwrap();
        let edns = decoded.extensions().as_ref().unwrap();
        assert!(edns.options().get(EdnsCode::Subnet).is_some());
    }

    #[test]
    fn truncated_response_keeps_header_and_question() {
        let query = query();
        let mut full = MessageBuilder::error_response(&query, ResponseCode::NoError);
        full.set_recursion_available(true);

        let truncated = MessageBuilder::truncated_response(&full);
        assert!(truncated.truncated());
        assert_eq!(truncated.id(), query.id());
        assert_eq!(truncated.queries(), query.queries());
        assert!(truncated.answers().is_empty());
    }
}
