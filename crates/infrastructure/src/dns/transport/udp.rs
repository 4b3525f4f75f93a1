//! UDP transport (RFC 1035 §4.2.1). Replies whose ID does not match the
//! query are ignored until the right one arrives or time runs out.

use async_trait::async_trait;
use splitroute_domain::DomainError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

use super::{map_io_error, message_id, timeout_error, DnsTransport, Protocol, TransportResponse};

const MAX_UDP_RESPONSE_SIZE: usize = 65535;

pub struct UdpTransport {
    server_addr: SocketAddr,
}

impl UdpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }

    fn bind_addr(&self) -> SocketAddr {
        let ip = if self.server_addr.is_ipv4() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        };
        SocketAddr::new(ip, 0)
    }
}

#[async_trait]
impl DnsTransport for UdpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let server_addr = self.server_addr;
        let expected_id = message_id(message_bytes)
            .ok_or_else(|| DomainError::InvalidDnsResponse("query shorter than header".into()))?;
        let deadline = Instant::now() + timeout;

        let socket = UdpSocket::bind(self.bind_addr())
            .await
            .map_err(|e| map_io_error(server_addr, e))?;
        socket
            .connect(server_addr)
            .await
            .map_err(|e| map_io_error(server_addr, e))?;
        socket
            .send(message_bytes)
            .await
            .map_err(|e| map_io_error(server_addr, e))?;

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            let received = tokio::time::timeout_at(deadline, socket.recv(&mut recv_buf))
                .await
                .map_err(|_| timeout_error(server_addr))?
                .map_err(|e| map_io_error(server_addr, e))?;

            if message_id(&recv_buf[..received]) == Some(expected_id) {
                recv_buf.truncate(received);
                debug!(server = %server_addr, bytes_received = received, "UDP response received");
                return Ok(TransportResponse {
                    bytes: recv_buf,
                    protocol_used: Protocol::Udp,
                });
            }

            debug!(server = %server_addr, expected_id, "Skipping UDP reply with foreign ID");
        }
    }

    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_replies_with_foreign_ids() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (n, from) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(&[0xFF, 0xFF, 0], from).await.unwrap();
            let mut reply = buf[..n].to_vec();
            reply.push(1);
            server.send_to(&reply, from).await.unwrap();
        });

        let transport = UdpTransport::new(server_addr);
        let response = transport
            .send(&[0xAB, 0xCD, 0], Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response.bytes, vec![0xAB, 0xCD, 0, 1]);
        assert_eq!(response.protocol_used, Protocol::Udp);
    }

    #[tokio::test]
    async fn times_out_without_reply() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::new(server.local_addr().unwrap());

        let result = transport
            .send(&[0x00, 0x01, 0], Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(DomainError::TransportTimeout { .. })));
    }
}
