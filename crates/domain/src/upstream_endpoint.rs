use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::errors::DomainError;

pub const DNS_PORT: u16 = 53;
pub const TLS_PORT: u16 = 853;

/// How queries travel to an upstream. Plain DNS picks UDP or TCP per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamTransport {
    Dns,
    Tls,
}

impl UpstreamTransport {
    pub fn default_port(&self) -> u16 {
        match self {
            UpstreamTransport::Dns => DNS_PORT,
            UpstreamTransport::Tls => TLS_PORT,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            UpstreamTransport::Dns => "dns",
            UpstreamTransport::Tls => "tls",
        }
    }
}

/// A parsed upstream destination: `IP`, `IP:PORT`, `dns://…` or `tls://…`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamEndpoint {
    pub addr: SocketAddr,
    pub transport: UpstreamTransport,
}

impl UpstreamEndpoint {
    pub fn is_tls(&self) -> bool {
        self.transport == UpstreamTransport::Tls
    }
}

impl FromStr for UpstreamEndpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (transport, rest) = match s.split_once("://") {
            Some(("dns", rest)) => (UpstreamTransport::Dns, rest),
            Some(("tls", rest)) => (UpstreamTransport::Tls, rest),
            Some((scheme, _)) => {
                return Err(DomainError::InvalidEndpoint(format!(
                    "'{scheme}' is not supported as a destination protocol in {s}"
                )))
            }
            None => (UpstreamTransport::Dns, s),
        };

        let addr = parse_host_port(rest, transport.default_port()).ok_or_else(|| {
            DomainError::InvalidEndpoint(format!("{s}: not an IP address or IP:PORT"))
        })?;

        Ok(Self { addr, transport })
    }
}

impl fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.transport.scheme(), self.addr)
    }
}

fn parse_host_port(s: &str, default_port: u16) -> Option<SocketAddr> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Some(addr);
    }
    let host = s.trim_start_matches('[').trim_end_matches(']');
    host.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, default_port))
}
