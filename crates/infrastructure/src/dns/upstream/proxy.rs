use async_trait::async_trait;
use hickory_proto::op::Message;
use splitroute_domain::{DomainError, UpstreamEndpoint};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::health::{HealthProbe, Liveness};
use super::{ConnectOptions, Upstream};
use crate::dns::forwarding::{MessageBuilder, ResponseParser};
use crate::dns::transport::{
    DnsTransport, Protocol, TcpTransport, TlsTransport, TransportResponse, UdpTransport,
};

/// Time allowed for one exchange with an upstream.
const READ_TIMEOUT: Duration = Duration::from_secs(2);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(1);
const MIN_HEALTH_CHECK_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_EXPIRE: Duration = Duration::from_secs(10);

struct ProxyTransports {
    udp: UdpTransport,
    tcp: TcpTransport,
    tls: Option<TlsTransport>,
}

impl ProxyTransports {
    async fn exchange(
        &self,
        protocol: Protocol,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        match protocol {
            Protocol::Udp => self.udp.send(message_bytes, timeout).await,
            Protocol::Tcp => self.tcp.send(message_bytes, timeout).await,
            Protocol::Tls => match &self.tls {
                Some(tls) => tls.send(message_bytes, timeout).await,
                None => Err(DomainError::Tls("no TLS configuration for upstream".into())),
            },
        }
    }

    /// Any well-formed reply to `. IN NS` counts as alive.
    async fn probe(&self, protocol: Protocol, recursion_desired: bool) -> Result<(), DomainError> {
        let query = MessageBuilder::health_check_query(recursion_desired);
        let bytes = MessageBuilder::serialize_message(&query)?;
        let response = self.exchange(protocol, &bytes, HEALTH_CHECK_TIMEOUT).await?;
        ResponseParser::parse(&response.bytes).map(|_| ())
    }
}

/// A single upstream resolver with its transports, liveness record and
/// health probe.
pub struct Proxy {
    endpoint: UpstreamEndpoint,
    label: String,
    transports: Arc<ProxyTransports>,
    liveness: Arc<Liveness>,
    probe: HealthProbe,
    recursion_desired: bool,
    health_check_tcp: bool,
}

impl Proxy {
    pub fn new(endpoint: UpstreamEndpoint) -> Self {
        let transports = ProxyTransports {
            udp: UdpTransport::new(endpoint.addr),
            tcp: TcpTransport::new(endpoint.addr, DEFAULT_EXPIRE),
            tls: None,
        };
        Self {
            label: endpoint.to_string(),
            endpoint,
            transports: Arc::new(transports),
            liveness: Arc::new(Liveness::new()),
            probe: HealthProbe::new(),
            recursion_desired: true,
            health_check_tcp: false,
        }
    }

    pub fn endpoint(&self) -> &UpstreamEndpoint {
        &self.endpoint
    }

    /// Idle connections older than `expire` are not reused.
    pub fn set_expire(&self, expire: Duration) {
        self.transports.tcp.set_expire(expire);
        if let Some(tls) = &self.transports.tls {
            tls.set_expire(expire);
        }
    }

    /// Must be called before the proxy is started.
    pub fn set_tls_config(
        &mut self,
        config: Arc<rustls::ClientConfig>,
        server_name: Option<&str>,
    ) -> Result<(), DomainError> {
        let expire = self.transports.tcp.expire();
        let tls = TlsTransport::new(self.endpoint.addr, server_name, config, expire)?;
        let transports = Arc::get_mut(&mut self.transports).ok_or_else(|| {
            DomainError::ConfigError(format!("{}: TLS configured after start", self.label))
        })?;
        transports.tls = Some(tls);
        Ok(())
    }

    /// RD flag of the health probe query.
    pub fn set_recursion_desired(&mut self, recursion_desired: bool) {
        self.recursion_desired = recursion_desired;
    }

    /// Probe over TCP instead of UDP (plain DNS upstreams only).
    pub fn set_health_check_tcp(&mut self, tcp: bool) {
        self.health_check_tcp = tcp;
    }

    pub fn fails(&self) -> u32 {
        self.liveness.fails()
    }

    fn health_check_protocol(&self) -> Protocol {
        if self.endpoint.is_tls() {
            Protocol::Tls
        } else if self.health_check_tcp {
            Protocol::Tcp
        } else {
            Protocol::Udp
        }
    }
}

#[async_trait]
impl Upstream for Proxy {
    fn addr(&self) -> &str {
        &self.label
    }

    fn down(&self, max_fails: u32) -> bool {
        self.liveness.down(max_fails)
    }

    async fn connect(&self, query: &Message, opts: ConnectOptions) -> Result<Message, DomainError> {
        let start = Instant::now();
        let protocol = opts.select(self.endpoint.is_tls());
        let bytes = MessageBuilder::serialize_message(query)?;

        let response = self
            .transports
            .exchange(protocol, &bytes, READ_TIMEOUT)
            .await?;
        let reply = ResponseParser::parse(&response.bytes)?;

        debug!(
            upstream = %self.label,
            protocol = response.protocol_used.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            truncated = reply.truncated(),
            "Upstream replied"
        );
        Ok(reply)
    }

    fn healthcheck(&self) {
        self.probe.trigger();
    }

    fn start(&self, interval: Duration) {
        let interval = interval.max(MIN_HEALTH_CHECK_INTERVAL);
        let transports = Arc::clone(&self.transports);
        let protocol = self.health_check_protocol();
        let recursion_desired = self.recursion_desired;

        self.probe.start(
            interval,
            Arc::clone(&self.liveness),
            self.label.clone(),
            move || {
                let transports = Arc::clone(&transports);
                async move { transports.probe(protocol, recursion_desired).await }
            },
        );
    }

    fn stop(&self) {
        self.probe.stop();
    }
}
