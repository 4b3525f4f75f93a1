#![allow(dead_code)]
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use hickory_proto::serialize::binary::BinEncodable;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::oneshot;

pub const MOCK_ANSWER: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockBehavior {
    /// One A record for every question.
    Answer,
    /// UDP replies carry TC and no answers; TCP replies are complete.
    TruncateUdp,
    /// Never replies.
    Silent,
}

#[derive(Default)]
pub struct MockStats {
    pub udp_queries: AtomicUsize,
    pub tcp_queries: AtomicUsize,
    pub tcp_connections: AtomicUsize,
}

/// A DNS server on 127.0.0.1 answering over UDP and TCP on one port.
pub struct MockDnsServer {
    addr: SocketAddr,
    stats: Arc<MockStats>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    pub async fn start(behavior: MockBehavior) -> std::io::Result<Self> {
        let (udp, tcp) = bind_pair().await?;
        let addr = udp.local_addr()?;
        let stats = Arc::new(MockStats::default());
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let udp_stats = Arc::clone(&stats);
        let tcp_stats = Arc::clone(&stats);

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = udp.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { continue };
                        udp_stats.udp_queries.fetch_add(1, Ordering::SeqCst);
                        if let Some(response) = respond(&buf[..len], behavior, false) {
                            let _ = udp.send_to(&response, peer).await;
                        }
                    }
                    accepted = tcp.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        tcp_stats.tcp_connections.fetch_add(1, Ordering::SeqCst);
                        tokio::spawn(serve_tcp(stream, behavior, Arc::clone(&tcp_stats)));
                    }
                }
            }
        });

        Ok(Self {
            addr,
            stats,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stats(&self) -> &MockStats {
        &self.stats
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// UDP and TCP sockets sharing one ephemeral port.
async fn bind_pair() -> std::io::Result<(UdpSocket, TcpListener)> {
    let mut last_error = None;
    for _ in 0..10 {
        let udp = UdpSocket::bind("127.0.0.1:0").await?;
        match TcpListener::bind(udp.local_addr()?).await {
            Ok(tcp) => return Ok((udp, tcp)),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| std::io::Error::other("no free port")))
}

async fn serve_tcp(mut stream: TcpStream, behavior: MockBehavior, stats: Arc<MockStats>) {
    loop {
        let Ok(len) = stream.read_u16().await else { return };
        let mut query = vec![0u8; len as usize];
        if stream.read_exact(&mut query).await.is_err() {
            return;
        }
        stats.tcp_queries.fetch_add(1, Ordering::SeqCst);

        let Some(response) = respond(&query, behavior, true) else {
            continue;
        };
        let mut frame = (response.len() as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(&response);
        if stream.write_all(&frame).await.is_err() {
            return;
        }
    }
}

fn respond(query: &[u8], behavior: MockBehavior, over_tcp: bool) -> Option<Vec<u8>> {
    if behavior == MockBehavior::Silent {
        return None;
    }
    let query = Message::from_vec(query).ok()?;

    let mut reply = Message::error_msg(query.id(), query.op_code(), ResponseCode::NoError);
    reply
        .set_message_type(MessageType::Response)
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true)
        .add_queries(query.queries().iter().cloned());

    if behavior == MockBehavior::TruncateUdp && !over_tcp {
        reply.set_truncated(true);
    } else {
        for question in query.queries() {
            reply.add_answer(Record::from_rdata(
                question.name().clone(),
                60,
                RData::A(A(MOCK_ANSWER)),
            ));
        }
    }

    reply.to_vec().ok()
}
