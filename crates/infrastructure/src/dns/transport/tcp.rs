use async_trait::async_trait;
use splitroute_domain::DomainError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use super::pool::StreamPool;
use super::stream::exchange_pooled;
use super::{map_io_error, timeout_error, DnsTransport, Protocol, TransportResponse};

/// DNS over TCP with a per-upstream pool of idle connections.
pub struct TcpTransport {
    server_addr: SocketAddr,
    pool: StreamPool<TcpStream>,
}

impl TcpTransport {
    pub fn new(server_addr: SocketAddr, expire: Duration) -> Self {
        Self {
            server_addr,
            pool: StreamPool::new(expire),
        }
    }

    pub fn set_expire(&self, expire: Duration) {
        self.pool.set_expire(expire);
    }

    pub fn expire(&self) -> Duration {
        self.pool.expire()
    }

    async fn connect_new(&self, timeout: Duration) -> Result<TcpStream, DomainError> {
        let server_addr = self.server_addr;
        let stream = tokio::time::timeout(timeout, TcpStream::connect(server_addr))
            .await
            .map_err(|_| timeout_error(server_addr))?
            .map_err(|e| map_io_error(server_addr, e))?;

        stream
            .set_nodelay(true)
            .map_err(|e| map_io_error(server_addr, e))?;

        debug!(server = %server_addr, "TCP connection established");
        Ok(stream)
    }
}

#[async_trait]
impl DnsTransport for TcpTransport {
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
            "TCP response received"
        );

        Ok(TransportResponse {
            bytes,
            protocol_used: Protocol::Tcp,
        })
    }

    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }
}
