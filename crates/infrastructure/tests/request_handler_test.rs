use hickory_proto::op::{Edns, Message, ResponseCode};
use hickory_proto::rr::{RData, RecordType};
use splitroute_domain::{DomainName, UpstreamEndpoint, UpstreamTransport};
use splitroute_infrastructure::dns::{
    DnsRequestHandler, ForwardGroup, GroupMatcher, MembershipSet, MessageBuilder, Protocol, Proxy,
    Router, ServFailNext, Upstream,
};
use std::sync::Arc;
use std::time::Duration;

mod helpers;
use helpers::{query, MockBehavior, MockDnsServer, MockUpstream, Step, MOCK_ANSWER};

fn handler(groups: Vec<ForwardGroup>) -> DnsRequestHandler {
    let router = Router::new(groups.into_iter().map(Arc::new).collect());
    DnsRequestHandler::new(Arc::new(router), Arc::new(ServFailNext))
}

fn suffix(name: &str) -> GroupMatcher {
    GroupMatcher::suffix(DomainName::parse(name).unwrap(), Vec::new())
}

fn encode(message: &Message) -> Vec<u8> {
    MessageBuilder::serialize_message(message).unwrap()
}

#[tokio::test]
async fn test_owned_query_is_forwarded_to_the_upstream() {
    let server = MockDnsServer::start(MockBehavior::Answer).await.unwrap();
    let proxy = Proxy::new(UpstreamEndpoint {
        addr: server.addr(),
        transport: UpstreamTransport::Dns,
    });
    let group = ForwardGroup::new(
        "corp",
        suffix("example.com"),
        vec![Arc::new(proxy) as Arc<dyn Upstream>],
    );
    let handler = handler(vec![group]);
    let query = query("WWW.Example.COM.");

    let bytes = handler
        .handle_bytes(&encode(&query), Protocol::Udp)
        .await
        .unwrap();
    let reply = Message::from_vec(&bytes).unwrap();

    assert_eq!(reply.id(), query.id());
    assert_eq!(reply.response_code(), ResponseCode::NoError);
    let address = reply.answers().iter().find_map(|r| match r.data() {
        Some(RData::A(a)) => Some(a.0),
        _ => None,
    });
    assert_eq!(address, Some(MOCK_ANSWER));
}

#[tokio::test]
async fn test_first_matching_group_handles_the_query() {
    let apple = Arc::new(MockUpstream::healthy("10.0.0.1:53"));
    let default = Arc::new(MockUpstream::healthy("10.0.0.2:53"));

    let mut set = MembershipSet::exact();
    set.add("*.icloud.com");

    let handler = handler(vec![
        ForwardGroup::new(
            "apple",
            GroupMatcher::with_set(set),
            vec![apple.clone() as Arc<dyn Upstream>],
        ),
        ForwardGroup::new(
            "default",
            GroupMatcher::catch_all(),
            vec![default.clone() as Arc<dyn Upstream>],
        ),
    ]);

    handler
        .handle_message(&query("p12-caldav.icloud.com."), Protocol::Udp)
        .await;
    handler
        .handle_message(&query("rust-lang.org."), Protocol::Udp)
        .await;

    assert_eq!(apple.connects(), 1);
    assert_eq!(default.connects(), 1);
}

#[tokio::test]
async fn test_root_query_is_forwarded_by_the_catch_all_group() {
    let corp = Arc::new(MockUpstream::healthy("10.0.0.1:53"));
    let default = Arc::new(MockUpstream::healthy("10.0.0.2:53"));
    let handler = handler(vec![
        ForwardGroup::new(
            "corp",
            suffix("example.com"),
            vec![corp.clone() as Arc<dyn Upstream>],
        ),
        ForwardGroup::new(
            "default",
            GroupMatcher::catch_all(),
            vec![default.clone() as Arc<dyn Upstream>],
        ),
    ]);
    let query = MessageBuilder::build_query(".", RecordType::NS).unwrap();

    let reply = handler.handle_message(&query, Protocol::Udp).await;

    assert_eq!(reply.response_code(), ResponseCode::NoError);
    assert_eq!(default.connects(), 1);
    assert_eq!(corp.connects(), 0);
}

#[tokio::test]
async fn test_root_query_is_not_owned_by_a_set_group() {
    let mut set = MembershipSet::exact();
    set.add("example.com");
    let upstream = Arc::new(MockUpstream::healthy("10.0.0.1:53"));
    let handler = handler(vec![ForwardGroup::new(
        "sets",
        GroupMatcher::with_set(set),
        vec![upstream.clone() as Arc<dyn Upstream>],
    )]);
    let query = MessageBuilder::build_query(".", RecordType::NS).unwrap();

    let reply = handler.handle_message(&query, Protocol::Udp).await;

    assert_eq!(reply.response_code(), ResponseCode::ServFail);
    assert_eq!(upstream.connects(), 0);
}

#[tokio::test]
async fn test_unowned_query_goes_to_the_next_handler() {
    let upstream = Arc::new(MockUpstream::healthy("10.0.0.1:53"));
    let handler = handler(vec![ForwardGroup::new(
        "corp",
        suffix("example.com"),
        vec![upstream.clone() as Arc<dyn Upstream>],
    )]);

    let reply = handler
        .handle_message(&query("example.org."), Protocol::Udp)
        .await;

    assert_eq!(reply.response_code(), ResponseCode::ServFail);
    assert_eq!(upstream.connects(), 0);
}

#[tokio::test]
async fn test_forwarding_failure_is_servfail() {
    let upstream = Arc::new(MockUpstream::new("10.0.0.1:53", Step::Refused));
    let group = ForwardGroup::new(
        "corp",
        suffix("example.com"),
        vec![upstream as Arc<dyn Upstream>],
    )
    .with_timeout(Duration::from_millis(100));
    let handler = handler(vec![group]);
    let query = query("www.example.com.");

    let reply = handler.handle_message(&query, Protocol::Udp).await;

    assert_eq!(reply.id(), query.id());
    assert_eq!(reply.response_code(), ResponseCode::ServFail);
    assert_eq!(reply.queries(), query.queries());
}

#[tokio::test]
async fn test_admission_rejection_is_refused() {
    let upstream = Arc::new(MockUpstream::new(
        "10.0.0.1:53",
        Step::Hang(Duration::from_millis(300)),
    ));
    let group = ForwardGroup::new(
        "corp",
        GroupMatcher::catch_all(),
        vec![upstream as Arc<dyn Upstream>],
    )
    .with_max_concurrent(1);
    let handler = Arc::new(handler(vec![group]));

    let busy = Arc::clone(&handler);
    let first = tokio::spawn(async move {
        busy.handle_message(&query("a.example.com."), Protocol::Udp)
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reply = handler
        .handle_message(&query("b.example.com."), Protocol::Udp)
        .await;
    assert_eq!(reply.response_code(), ResponseCode::Refused);

    assert_eq!(first.await.unwrap().response_code(), ResponseCode::NoError);
}

#[tokio::test]
async fn test_oversized_udp_reply_is_truncated() {
    let upstream = Arc::new(MockUpstream::new("10.0.0.1:53", Step::ReplyLarge(64)));
    let handler = handler(vec![ForwardGroup::new(
        "corp",
        GroupMatcher::catch_all(),
        vec![upstream as Arc<dyn Upstream>],
    )]);
    let query = query("big.example.com.");

    let udp = handler
        .handle_bytes(&encode(&query), Protocol::Udp)
        .await
        .unwrap();
    let reply = Message::from_vec(&udp).unwrap();
    assert!(udp.len() <= 512);
    assert!(reply.truncated());
    assert!(reply.answers().is_empty());
    assert_eq!(reply.id(), query.id());

    let tcp = handler
        .handle_bytes(&encode(&query), Protocol::Tcp)
        .await
        .unwrap();
    let reply = Message::from_vec(&tcp).unwrap();
    assert!(!reply.truncated());
    assert_eq!(reply.answers().len(), 64);
}

#[tokio::test]
async fn test_edns_payload_size_allows_larger_udp_replies() {
    let upstream = Arc::new(MockUpstream::new("10.0.0.1:53", Step::ReplyLarge(64)));
    let handler = handler(vec![ForwardGroup::new(
        "corp",
        GroupMatcher::catch_all(),
        vec![upstream as Arc<dyn Upstream>],
    )]);
    let mut query = query("big.example.com.");
    let mut edns = Edns::new();
    edns.set_max_payload(4096);
    query.set_edns(edns);

    let udp = handler
        .handle_bytes(&encode(&query), Protocol::Udp)
        .await
        .unwrap();
    let reply = Message::from_vec(&udp).unwrap();

    assert!(!reply.truncated());
    assert_eq!(reply.answers().len(), 64);
}

#[tokio::test]
async fn test_query_with_two_questions_is_formerr() {
    let handler = handler(vec![ForwardGroup::new(
        "default",
        GroupMatcher::catch_all(),
        vec![Arc::new(MockUpstream::healthy("10.0.0.1:53")) as Arc<dyn Upstream>],
    )]);
    let mut query = query("a.example.com.");
    let second = query.queries()[0].clone();
    query.add_query(second);

    let reply = handler.handle_message(&query, Protocol::Udp).await;

    assert_eq!(reply.response_code(), ResponseCode::FormErr);
}
