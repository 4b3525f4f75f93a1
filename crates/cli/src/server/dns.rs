use socket2::{Domain, Protocol as SocketProtocol, Socket, Type};
use splitroute_infrastructure::dns::{DnsRequestHandler, Protocol};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const UDP_RECV_BUFFER: usize = 4096;
const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn start_dns_server(
    bind_addr: String,
    tcp_enabled: bool,
    handler: Arc<DnsRequestHandler>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let socket_addr: SocketAddr = bind_addr.parse()?;
    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let mut join_set: JoinSet<()> = JoinSet::new();

    let udp_socket = Arc::new(create_udp_socket(domain, socket_addr)?);
    let udp_handler = Arc::clone(&handler);
    let udp_shutdown = shutdown.clone();
    join_set.spawn(async move {
        run_udp_listener(udp_socket, udp_handler, udp_shutdown).await;
    });

    if tcp_enabled {
        let tcp_listener = create_tcp_listener(domain, socket_addr)?;
        let tcp_shutdown = shutdown.clone();
        join_set.spawn(async move {
            run_tcp_listener(tcp_listener, handler, tcp_shutdown).await;
        });
    }

    info!(bind_address = %socket_addr, tcp_enabled, "DNS server ready");

    while join_set.join_next().await.is_some() {}
    Ok(())
}

async fn run_udp_listener(
    socket: Arc<UdpSocket>,
    handler: Arc<DnsRequestHandler>,
    shutdown: CancellationToken,
) {
    let mut recv_buf = [0u8; UDP_RECV_BUFFER];

    loop {
        let (n, from) = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = socket.recv_from(&mut recv_buf) => match received {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // ICMP port-unreachable from an earlier reply surfaces here on some platforms
                    debug!(error = %e, "UDP recv error");
                    continue;
                }
            },
        };

        let handler = Arc::clone(&handler);
        let socket = Arc::clone(&socket);
        let query: Arc<[u8]> = Arc::from(&recv_buf[..n]);
        tokio::spawn(async move {
            if let Some(response) = handler.handle_bytes(&query, Protocol::Udp).await {
                if let Err(e) = socket.send_to(&response, from).await {
                    debug!(client = %from, error = %e, "UDP send failed");
                }
            }
        });
    }

    info!("UDP listener stopped");
}

async fn run_tcp_listener(
    listener: TcpListener,
    handler: Arc<DnsRequestHandler>,
    shutdown: CancellationToken,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "TCP accept error");
                    continue;
                }
            },
        };

        let handler = Arc::clone(&handler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                result = serve_tcp_connection(stream, handler) => {
                    if let Err(e) = result {
                        debug!(client = %peer, error = %e, "TCP connection closed");
                    }
                }
            }
        });
    }

    info!("TCP listener stopped");
}

/// Answers length-prefixed queries until the client goes quiet or hangs up.
async fn serve_tcp_connection(
    mut stream: TcpStream,
    handler: Arc<DnsRequestHandler>,
) -> io::Result<()> {
    loop {
        let len = match tokio::time::timeout(TCP_IDLE_TIMEOUT, stream.read_u16()).await {
            Ok(Ok(len)) => usize::from(len),
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Ok(Err(e)) => return Err(e),
            Err(_) => return Ok(()),
        };

        let mut query = vec![0u8; len];
        tokio::time::timeout(TCP_IDLE_TIMEOUT, stream.read_exact(&mut query))
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;

        let Some(response) = handler.handle_bytes(&query, Protocol::Tcp).await else {
            continue;
        };
        let response_len = u16::try_from(response.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "response too large"))?;

        let mut frame = Vec::with_capacity(response.len() + 2);
        frame.extend_from_slice(&response_len.to_be_bytes());
        frame.extend_from_slice(&response);
        stream.write_all(&frame).await?;
    }
}

fn create_udp_socket(domain: Domain, socket_addr: SocketAddr) -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(domain, Type::DGRAM, Some(SocketProtocol::UDP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(512 * 1024)?;
    socket.set_send_buffer_size(512 * 1024)?;
    socket.bind(&socket_addr.into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

fn create_tcp_listener(domain: Domain, socket_addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let socket = Socket::new(domain, Type::STREAM, Some(SocketProtocol::TCP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(std_listener)?)
}
