pub mod health;
pub mod proxy;

use async_trait::async_trait;
use hickory_proto::op::Message;
use splitroute_domain::DomainError;
use std::time::Duration;

use crate::dns::transport::Protocol;

pub use health::{HealthProbe, Liveness};
pub use proxy::Proxy;

/// Per-query transport preferences of a forwarding group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub force_tcp: bool,
    pub prefer_udp: bool,
    /// Protocol the client used to reach us.
    pub client_protocol: Protocol,
}

impl ConnectOptions {
    /// TLS upstreams always use TLS. Otherwise `force_tcp` wins over
    /// `prefer_udp`, which wins over the client's own protocol.
    pub fn select(&self, tls_upstream: bool) -> Protocol {
        if tls_upstream {
            Protocol::Tls
        } else if self.force_tcp {
            Protocol::Tcp
        } else if self.prefer_udp {
            Protocol::Udp
        } else {
            match self.client_protocol {
                Protocol::Udp => Protocol::Udp,
                Protocol::Tcp | Protocol::Tls => Protocol::Tcp,
            }
        }
    }
}

/// One upstream resolver as seen by the forwarding loop.
#[async_trait]
pub trait Upstream: Send + Sync {
    fn addr(&self) -> &str;

    /// False when `max_fails` is 0; otherwise true once the failure count
    /// exceeds `max_fails`.
    fn down(&self, max_fails: u32) -> bool;

    async fn connect(&self, query: &Message, opts: ConnectOptions)
        -> Result<Message, DomainError>;

    /// Asks the probe task to verify this upstream. Never blocks.
    fn healthcheck(&self);

    fn start(&self, interval: Duration);

    fn stop(&self);
}
