//! DNS-over-TLS (RFC 7858). Idle sessions are pooled per upstream so that
//! follow-up queries skip the handshake.

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use splitroute_domain::DomainError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::pool::StreamPool;
use super::stream::exchange_pooled;
use super::{map_io_error, timeout_error, DnsTransport, Protocol, TransportResponse};

pub struct TlsTransport {
    server_addr: SocketAddr,
    server_name: ServerName<'static>,
    connector: TlsConnector,
    pool: StreamPool<TlsStream<TcpStream>>,
}

impl TlsTransport {
    /// `server_name` is verified against the upstream certificate; without
    /// one the upstream IP is used.
    pub fn new(
        server_addr: SocketAddr,
        server_name: Option<&str>,
        config: Arc<rustls::ClientConfig>,
        expire: Duration,
    ) -> Result<Self, DomainError> {
        let name = server_name
            .map(str::to_string)
            .unwrap_or_else(|| server_addr.ip().to_string());
        let server_name = ServerName::try_from(name.clone())
            .map_err(|e| DomainError::Tls(format!("invalid TLS server name '{name}': {e}")))?;

        Ok(Self {
            server_addr,
            server_name,
            connector: TlsConnector::from(config),
            pool: StreamPool::new(expire),
        })
    }

    pub fn set_expire(&self, expire: Duration) {
        self.pool.set_expire(expire);
    }

    async fn connect_new(&self, timeout: Duration) -> Result<TlsStream<TcpStream>, DomainError> {
        let server_addr = self.server_addr;
        let tcp_stream = tokio::time::timeout(timeout, TcpStream::connect(server_addr))
            .await
            .map_err(|_| timeout_error(server_addr))?
            .map_err(|e| map_io_error(server_addr, e))?;
        tcp_stream
            .set_nodelay(true)
            .map_err(|e| map_io_error(server_addr, e))?;

        let tls_stream = tokio::time::timeout(
            timeout,
            self.connector.connect(self.server_name.clone(), tcp_stream),
        )
        .await
        .map_err(|_| timeout_error(server_addr))?
        .map_err(|e| DomainError::Tls(format!("handshake with {server_addr} failed: {e}")))?;

        debug!(server = %server_addr, "TLS connection established");
        Ok(tls_stream)
    }
}

#[async_trait]
impl DnsTransport for TlsTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let bytes = exchange_pooled(&self.pool, self.server_addr, message_bytes, timeout, || {
            self.connect_new(timeout)
        })
        .await?;

        debug!(
            server = %self.server_addr,
            response_len = bytes.len(),
            "TLS response received"
        );

        Ok(TransportResponse {
            bytes,
            protocol_used: Protocol::Tls,
        })
    }

    fn protocol(&self) -> Protocol {
        Protocol::Tls
    }
}
