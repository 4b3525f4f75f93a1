use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::RData;
use splitroute_domain::DomainError;
use std::net::IpAddr;

pub struct ResponseParser;

impl ResponseParser {
    pub fn parse(response_bytes: &[u8]) -> Result<Message, DomainError> {
        Message::from_vec(response_bytes).map_err(|e| {
            DomainError::InvalidDnsResponse(format!("Failed to parse DNS response: {}", e))
        })
    }

    /// True when `reply` answers `query`: response flag, same ID and a
    /// single question with the same name (case-insensitive) and type.
    pub fn reply_matches(query: &Message, reply: &Message) -> bool {
        if reply.message_type() != MessageType::Response || reply.id() != query.id() {
            return false;
        }

        match (query.queries(), reply.queries()) {
            ([asked], [answered]) => {
                asked.query_type() == answered.query_type()
                    && asked
                        .name()
                        .to_ascii()
                        .eq_ignore_ascii_case(&answered.name().to_ascii())
            }
            _ => false,
        }
    }

    /// First A or AAAA address in the answer section.
    pub fn first_address(reply: &Message) -> Option<IpAddr> {
        reply.answers().iter().find_map(|record| match record.data() {
            Some(RData::A(a)) => Some(IpAddr::V4(a.0)),
            Some(RData::AAAA(aaaa)) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::forwarding::MessageBuilder;
    use hickory_proto::op::{Query, ResponseCode};
    use hickory_proto::rr::{Name, RecordType};
    use std::str::FromStr;

    fn query() -> Message {
        MessageBuilder::build_query("Example.com.", RecordType::A).unwrap()
    }

    fn reply_to(query: &Message) -> Message {
        MessageBuilder::error_response(query, ResponseCode::NoError)
    }

    #[test]
    fn matching_reply_is_accepted() {
        let query = query();
        assert!(ResponseParser::reply_matches(&query, &reply_to(&query)));
    }

    #[test]
    fn name_comparison_ignores_case() {
        let query = query();
        let mut reply = Message::error_msg(query.id(), query.op_code(), ResponseCode::NoError);
        reply.add_query(Query::query(
            Name::from_str("EXAMPLE.COM.").unwrap(),
            RecordType::A,
        ));
        assert!(ResponseParser::reply_matches(&query, &reply));
    }

    #[test]
    fn mismatched_replies_are_rejected() {
        let query = query();

        let mut wrong_id = reply_to(&query);
        wrong_id.set_id(query.id().wrapping_add(1));
        assert!(!ResponseParser::reply_matches(&query, &wrong_id));

        let mut not_response = reply_to(&query);
        not_response.set_message_type(MessageType::Query);
        assert!(!ResponseParser::reply_matches(&query, &not_response));

        let mut wrong_type = Message::error_msg(query.id(), query.op_code(), ResponseCode::NoError);
        wrong_type.add_query(Query::query(
            Name::from_str("example.com.").unwrap(),
            RecordType::AAAA,
        ));
        assert!(!ResponseParser::reply_matches(&query, &wrong_type));

        let no_question = Message::error_msg(query.id(), query.op_code(), ResponseCode::NoError);
        assert!(!ResponseParser::reply_matches(&query, &no_question));
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(ResponseParser::parse(&[1, 2, 3]).is_err());
    }
}
