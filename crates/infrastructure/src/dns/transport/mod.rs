pub mod pool;
pub mod stream;
pub mod tcp;
pub mod tls;
pub mod tls_config;
pub mod udp;

use async_trait::async_trait;
use splitroute_domain::DomainError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

pub use pool::StreamPool;
pub use tcp::TcpTransport;
pub use tls::TlsTransport;
pub use tls_config::build_client_config;
pub use udp::UdpTransport;

/// Wire protocol used for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
    Tls,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "UDP",
            Protocol::Tcp => "TCP",
            Protocol::Tls => "TLS",
        }
    }
}

#[derive(Debug)]
pub struct TransportResponse {
    pub bytes: Vec<u8>,

    pub protocol_used: Protocol,
}

#[async_trait]
pub trait DnsTransport: Send + Sync {
    /// Sends one DNS message and returns the reply carrying the same ID.
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError>;

    fn protocol(&self) -> Protocol;
}

/// Message ID from the first two bytes of a wire message.
#[inline]
pub(crate) fn message_id(bytes: &[u8]) -> Option<u16> {
    (bytes.len() >= 2).then(|| u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn map_io_error(server: SocketAddr, err: io::Error) -> DomainError {
    let server = server.to_string();
    match err.kind() {
        io::ErrorKind::ConnectionRefused => DomainError::TransportConnectionRefused { server },
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => DomainError::TransportConnectionReset { server },
        io::ErrorKind::TimedOut => DomainError::TransportTimeout { server },
        _ => DomainError::Transport {
            server,
            message: err.to_string(),
        },
    }
}

pub(crate) fn timeout_error(server: SocketAddr) -> DomainError {
    DomainError::TransportTimeout {
        server: server.to_string(),
    }
}
