use hickory_proto::op::Message;
use splitroute_domain::{ClientSubnet, DomainError};
use std::borrow::Cow;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::message_builder::MessageBuilder;
use super::metrics::{ForwardMetrics, ForwardMetricsSnapshot};
use super::response_parser::ResponseParser;
use crate::dns::load_balancer::Policy;
use crate::dns::membership::GroupMatcher;
use crate::dns::transport::Protocol;
use crate::dns::upstream::{ConnectOptions, Upstream};

/// Upper bound on the time one query may spend in the forwarding loop.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_MAX_FAILS: u32 = 2;
const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Holds one slot of the group's in-flight counter until dropped.
struct AdmissionPermit<'a> {
    counter: &'a AtomicI64,
}

impl<'a> AdmissionPermit<'a> {
    fn acquire(counter: &'a AtomicI64) -> (Self, i64) {
        let in_flight = counter.fetch_add(1, Ordering::AcqRel) + 1;
        (Self { counter }, in_flight)
    }
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A named set of upstreams plus the rule deciding which names it owns.
pub struct ForwardGroup {
    name: Arc<str>,
    matcher: GroupMatcher,
    upstreams: Vec<Arc<dyn Upstream>>,
    policy: Policy,
    max_fails: u32,
    health_check_interval: Duration,
    max_concurrent: i64,
    force_tcp: bool,
    prefer_udp: bool,
    client_subnets: Vec<ClientSubnet>,
    timeout: Duration,
    concurrent: AtomicI64,
    metrics: ForwardMetrics,
}

impl ForwardGroup {
    pub fn new(
        name: impl Into<Arc<str>>,
        matcher: GroupMatcher,
        upstreams: Vec<Arc<dyn Upstream>>,
    ) -> Self {
        Self {
            name: name.into(),
            matcher,
            upstreams,
            policy: Policy::default(),
            max_fails: DEFAULT_MAX_FAILS,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            max_concurrent: 0,
            force_tcp: false,
            prefer_udp: false,
            client_subnets: Vec::new(),
            timeout: DEFAULT_FORWARD_TIMEOUT,
            concurrent: AtomicI64::new(0),
            metrics: ForwardMetrics::default(),
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// 0 disables liveness tracking: upstreams are never considered down.
    pub fn with_max_fails(mut self, max_fails: u32) -> Self {
        self.max_fails = max_fails;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// 0 means unlimited.
    pub fn with_max_concurrent(mut self, max_concurrent: i64) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_transport(mut self, force_tcp: bool, prefer_udp: bool) -> Self {
        self.force_tcp = force_tcp;
        self.prefer_udp = prefer_udp;
        self
    }

    pub fn with_client_subnets(mut self, subnets: Vec<ClientSubnet>) -> Self {
        self.client_subnets = subnets;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &GroupMatcher {
        &self.matcher
    }

    pub fn matches(&self, name: &str) -> bool {
        self.matcher.matches(name)
    }

    pub fn upstream_count(&self) -> usize {
        self.upstreams.len()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn in_flight(&self) -> i64 {
        self.concurrent.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> ForwardMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn start(&self) {
        for upstream in &self.upstreams {
            upstream.start(self.health_check_interval);
        }
        info!(
            group = %self.name,
            upstreams = self.upstreams.len(),
            policy = self.policy.name(),
            mode = self.matcher.mode(),
            "Forwarding group started"
        );
    }

    pub fn stop(&self) {
        for upstream in &self.upstreams {
            upstream.stop();
        }
    }

    /// Sends `query` to one of the group's upstreams and returns the reply.
    ///
    /// Down upstreams are skipped; when all of them are down a random one is
    /// tried anyway. A reply that does not answer `query` is replaced by a
    /// FORMERR reply.
    pub async fn forward(
        &self,
        query: &Message,
        client_protocol: Protocol,
    ) -> Result<Message, DomainError> {
        ForwardMetrics::incr(&self.metrics.requests);
        let _permit = self.admit()?;

        if self.upstreams.is_empty() {
            return Err(DomainError::NoHealthyUpstream);
        }

        let query = self.with_client_subnet(query);
        let opts = ConnectOptions {
            force_tcp: self.force_tcp,
            prefer_udp: self.prefer_udp,
            client_protocol,
        };

        let deadline = Instant::now() + self.timeout;
        let list = self.policy.list(&self.upstreams);
        let mut last_error: Option<DomainError> = None;
        let mut fails = 0usize;
        let mut i = 0usize;

        while Instant::now() < deadline {
            if i >= list.len() {
                i = 0;
                fails = 0;
            }

            let mut upstream = &list[i];
            i += 1;

            if upstream.down(self.max_fails) {
                fails += 1;
                if fails < self.upstreams.len() {
                    continue;
                }
                upstream = &self.upstreams[fastrand::usize(..self.upstreams.len())];
                ForwardMetrics::incr(&self.metrics.healthcheck_broken);
                warn!(
                    group = %self.name,
                    upstream = upstream.addr(),
                    "All upstreams are down, trying a random one"
                );
            }

            match self.exchange(upstream.as_ref(), &query, opts, deadline).await {
                Ok(reply) => {
                    if !ResponseParser::reply_matches(&query, &reply) {
                        warn!(
                            group = %self.name,
                            upstream = upstream.addr(),
                            query_id = query.id(),
                            reply_id = reply.id(),
                            "Upstream reply does not match the query"
                        );
                        return Ok(MessageBuilder::format_error(&query));
                    }
                    return Ok(reply);
                }
                Err(e) => {
                    ForwardMetrics::incr(&self.metrics.upstream_errors);
                    debug!(
                        group = %self.name,
                        upstream = upstream.addr(),
                        error = %e,
                        "Upstream exchange failed"
                    );
                    if self.max_fails != 0 && e.is_transport_error() {
                        upstream.healthcheck();
                    }
                    last_error = Some(e);
                    if fails < self.upstreams.len() {
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_error.unwrap_or(DomainError::NoHealthyUpstream))
    }

    fn admit(&self) -> Result<Option<AdmissionPermit<'_>>, DomainError> {
        if self.max_concurrent <= 0 {
            return Ok(None);
        }

        let (permit, in_flight) = AdmissionPermit::acquire(&self.concurrent);
        if in_flight > self.max_concurrent {
            ForwardMetrics::incr(&self.metrics.max_concurrent_rejects);
            debug!(group = %self.name, in_flight, "Concurrent query limit reached");
            return Err(DomainError::LimitExceeded(self.max_concurrent));
        }
        Ok(Some(permit))
    }

    fn with_client_subnet<'q>(&self, query: &'q Message) -> Cow<'q, Message> {
        if self.client_subnets.is_empty() {
            return Cow::Borrowed(query);
        }
        let subnet = &self.client_subnets[fastrand::usize(..self.client_subnets.len())];
        let mut query = query.clone();
        MessageBuilder::attach_client_subnet(&mut query, subnet);
        Cow::Owned(query)
    }

    /// One upstream, retried while the failure is transient: a pooled
    /// connection closed by the peer, or a truncated UDP reply when TCP is
    /// allowed.
    async fn exchange(
        &self,
        upstream: &dyn Upstream,
        query: &Message,
        mut opts: ConnectOptions,
        deadline: Instant,
    ) -> Result<Message, DomainError> {
        loop {
            let result = tokio::time::timeout_at(deadline, upstream.connect(query, opts))
                .await
                .map_err(|_| DomainError::TransportTimeout {
                    server: upstream.addr().to_string(),
                })?;

            match result {
                Err(DomainError::CachedConnectionClosed) => continue,
                Ok(reply) if reply.truncated() && opts.prefer_udp && !opts.force_tcp => {
                    debug!(upstream = upstream.addr(), "Truncated reply, retrying over TCP");
                    opts.force_tcp = true;
                }
                other => return other,
            }
        }
    }
}
