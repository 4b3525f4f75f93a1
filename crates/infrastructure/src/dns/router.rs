use hickory_proto::op::Message;
use splitroute_domain::DomainError;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::forwarding::ForwardGroup;
use super::transport::Protocol;

pub enum RouteOutcome {
    Forwarded {
        group: Arc<ForwardGroup>,
        result: Result<Message, DomainError>,
    },
    /// No group owns the name; the query belongs to the next handler.
    NoMatch,
}

/// Ordered forwarding groups. The first group whose matcher owns a name
/// handles it.
pub struct Router {
    groups: Vec<Arc<ForwardGroup>>,
}

impl Router {
    pub fn new(groups: Vec<Arc<ForwardGroup>>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[Arc<ForwardGroup>] {
        &self.groups
    }

    pub fn match_group(&self, name: &str) -> Option<&Arc<ForwardGroup>> {
        self.groups.iter().find(|group| group.matches(name))
    }

    pub async fn route(&self, name: &str, query: &Message, client_protocol: Protocol) -> RouteOutcome {
        let start = Instant::now();
        let Some(group) = self.match_group(name) else {
            debug!(name, "No forwarding group owns the name");
            return RouteOutcome::NoMatch;
        };
        let matched_in = start.elapsed();

        let result = group.forward(query, client_protocol).await;

        debug!(
            group = group.name(),
            name,
            match_us = matched_in.as_micros() as u64,
            spent_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Query forwarded"
        );

        RouteOutcome::Forwarded {
            group: Arc::clone(group),
            result,
        }
    }

    pub fn start(&self) {
        for group in &self.groups {
            group.start();
        }
    }

    pub fn stop(&self) {
        for group in &self.groups {
            group.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::membership::{GroupMatcher, MembershipSet};
    use splitroute_domain::DomainName;

    fn group(name: &str, matcher: GroupMatcher) -> Arc<ForwardGroup> {
        Arc::new(ForwardGroup::new(name, matcher, Vec::new()))
    }

    #[test]
    fn first_matching_group_wins() {
        let mut set = MembershipSet::exact();
        set.add("apple.com");

        let router = Router::new(vec![
            group("apple", GroupMatcher::with_set(set)),
            group(
                "corp",
                GroupMatcher::suffix(DomainName::parse("example.com").unwrap(), Vec::new()),
            ),
            group("default", GroupMatcher::catch_all()),
        ]);

        assert_eq!(router.match_group("apple.com").unwrap().name(), "apple");
        assert_eq!(router.match_group("www.example.com").unwrap().name(), "corp");
        assert_eq!(router.match_group("rust-lang.org").unwrap().name(), "default");
    }

    #[test]
    fn no_group_owns_the_name() {
        let router = Router::new(vec![group(
            "corp",
            GroupMatcher::suffix(DomainName::parse("example.com").unwrap(), Vec::new()),
        )]);
        assert!(router.match_group("example.org").is_none());
        assert!(Router::new(Vec::new()).match_group("example.com").is_none());
    }
}
