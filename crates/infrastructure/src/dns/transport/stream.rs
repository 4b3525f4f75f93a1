//! Length-prefixed DNS framing shared by TCP and TLS (RFC 1035 §4.2.2).

use splitroute_domain::DomainError;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::pool::StreamPool;
use super::{map_io_error, message_id, timeout_error};

const MAX_TCP_MESSAGE_SIZE: usize = 65535;

/// Runs one exchange on a pooled connection, or on a fresh one when the pool
/// is empty. A failure on a reused connection is reported as
/// `CachedConnectionClosed` so the caller can retry on a new one.
pub(crate) async fn exchange_pooled<S, F, Fut>(
    pool: &StreamPool<S>,
    server: SocketAddr,
    message_bytes: &[u8],
    timeout: Duration,
    connect: F,
) -> Result<Vec<u8>, DomainError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S, DomainError>>,
{
    let expected_id = message_id(message_bytes)
        .ok_or_else(|| DomainError::InvalidDnsResponse("query shorter than header".into()))?;

    let (mut stream, reused) = match pool.take() {
        Some(stream) => (stream, true),
        None => (connect().await?, false),
    };

    let result = tokio::time::timeout(
        timeout,
        round_trip(&mut stream, message_bytes, expected_id),
    )
    .await;

    match result {
        Ok(Ok(reply)) => {
            pool.put(stream);
            Ok(reply)
        }
        Ok(Err(e)) if reused => {
            debug!(server = %server, error = %e, "Pooled connection closed by peer");
            Err(DomainError::CachedConnectionClosed)
        }
        Ok(Err(e)) => Err(map_io_error(server, e)),
        Err(_) => Err(timeout_error(server)),
    }
}

async fn round_trip<S>(stream: &mut S, message_bytes: &[u8], expected_id: u16) -> io::Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send_with_length_prefix(stream, message_bytes).await?;
    loop {
        let reply = read_with_length_prefix(stream).await?;
        if message_id(&reply) == Some(expected_id) {
            return Ok(reply);
        }
        debug!(expected_id, "Skipping stream reply with foreign ID");
    }
}

pub(crate) async fn send_with_length_prefix<S>(stream: &mut S, message_bytes: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let length = u16::try_from(message_bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "DNS message too large"))?;

    let mut frame = Vec::with_capacity(message_bytes.len() + 2);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(message_bytes);

    stream.write_all(&frame).await?;
    stream.flush().await
}

pub(crate) async fn read_with_length_prefix<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;

    let response_len = u16::from_be_bytes(len_buf) as usize;
    if response_len > MAX_TCP_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("response too large: {response_len} bytes"),
        ));
    }

    let mut response = vec![0u8; response_len];
    stream.read_exact(&mut response).await?;
    Ok(response)
}
