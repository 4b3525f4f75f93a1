use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use splitroute_domain::DomainError;
use std::sync::Arc;
use tracing::{debug, warn};

use super::forwarding::MessageBuilder;
use super::router::{RouteOutcome, Router};
use super::transport::Protocol;

const DNS_HEADER_LEN: usize = 12;

/// Receives the queries no forwarding group owns.
#[async_trait]
pub trait NextHandler: Send + Sync {
    async fn handle(&self, query: &Message, client_protocol: Protocol) -> Message;
}

/// Answers every query with SERVFAIL.
pub struct ServFailNext;

#[async_trait]
impl NextHandler for ServFailNext {
    async fn handle(&self, query: &Message, _client_protocol: Protocol) -> Message {
        MessageBuilder::error_response(query, ResponseCode::ServFail)
    }
}

pub fn response_code_for(err: &DomainError) -> ResponseCode {
    match err {
        DomainError::LimitExceeded(_) => ResponseCode::Refused,
        _ => ResponseCode::ServFail,
    }
}

/// Wire-level entry point: parses a query, routes it and always produces a
/// reply for anything that carries a DNS header.
pub struct DnsRequestHandler {
    router: Arc<Router>,
    next: Arc<dyn NextHandler>,
}

impl DnsRequestHandler {
    pub fn new(router: Arc<Router>, next: Arc<dyn NextHandler>) -> Self {
        Self { router, next }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Returns `None` only when the datagram is too short to answer.
    pub async fn handle_bytes(&self, request: &[u8], client_protocol: Protocol) -> Option<Vec<u8>> {
        let query = match Message::from_vec(request) {
            Ok(query) => query,
            Err(e) => {
                if request.len() < DNS_HEADER_LEN {
                    debug!(len = request.len(), "Dropping runt datagram");
                    return None;
                }
                debug!(error = %e, "Unparsable query");
                let id = u16::from_be_bytes([request[0], request[1]]);
                let reply = Message::error_msg(id, OpCode::Query, ResponseCode::FormErr);
                return encode(&reply);
            }
        };

        let mut reply = self.handle_message(&query, client_protocol).await;

        if client_protocol == Protocol::Udp {
            let max_payload = usize::from(query.max_payload());
            let bytes = encode(&reply)?;
            if bytes.len() <= max_payload {
                return Some(bytes);
            }
            debug!(len = bytes.len(), max_payload, "Reply too large for UDP, truncating");
            reply = MessageBuilder::truncated_response(&reply);
        }

        encode(&reply)
    }

    pub async fn handle_message(&self, query: &Message, client_protocol: Protocol) -> Message {
        if query.message_type() != MessageType::Query
            || query.op_code() != OpCode::Query
            || query.queries().len() != 1
        {
            debug!(
                id = query.id(),
                questions = query.queries().len(),
                "Rejecting malformed query"
            );
            return MessageBuilder::format_error(query);
        }

        // Lower-cased FQDN; the root stays "." so suffix groups rooted at "." own it.
        let name = query.queries()[0].name().to_ascii().to_ascii_lowercase();

        match self.router.route(&name, query, client_protocol).await {
            RouteOutcome::Forwarded { result: Ok(reply), .. } => reply,
            RouteOutcome::Forwarded {
                group,
                result: Err(e),
            } => {
                warn!(group = group.name(), name = %name, error = %e, "Forwarding failed");
                MessageBuilder::error_response(query, response_code_for(&e))
            }
            RouteOutcome::NoMatch => self.next.handle(query, client_protocol).await,
        }
    }
}

fn encode(message: &Message) -> Option<Vec<u8>> {
    match MessageBuilder::serialize_message(message) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "Failed to encode reply");
            None
        }
    }
}
