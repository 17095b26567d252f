//! Full-duplex byte relay with per-direction half-close.
//!
//! The sniffed bytes go to the backend first. After that two copy loops
//! run concurrently, one per direction. When a loop sees end-of-stream on
//! its read side it shuts down only the write side of the opposite peer,
//! so the other direction keeps flowing. Both sockets are released only
//! after both loops have finished.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::stream::{set_keepalive, Duplex};

pub const RELAY_BUFFER_SIZE: usize = 16 * 1024;

pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(10);

/// Bytes moved in each direction, the replayed initial bytes included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    pub to_backend: u64,
    pub to_client: u64,
}

/// Relay between `client` and `backend` until both directions are done.
///
/// Returns an error only when `initial` cannot be written; failures inside
/// a copy loop end that direction and are logged.
pub async fn relay<C, B>(
    client: C,
    mut backend: B,
    initial: &[u8],
    keepalive: Option<Duration>,
) -> io::Result<Transfer>
where
    C: Duplex,
    B: Duplex,
{
    if let Some(period) = keepalive {
        for (leg, tcp) in [("client", client.tcp()), ("backend", backend.tcp())] {
            if let Some(tcp) = tcp {
                if let Err(e) = set_keepalive(tcp, period) {
                    tracing::debug!(leg, error = %e, "failed to enable keep-alive");
                }
            }
        }
    }

    backend.write_all(initial).await?;
    backend.flush().await?;

    let client_half_close = client.supports_half_close();
    let backend_half_close = backend.supports_half_close();

    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);

    let upstream = pipe(
        &mut client_read,
        &mut backend_write,
        backend_half_close,
        "client->backend",
    );
    let downstream = pipe(
        &mut backend_read,
        &mut client_write,
        client_half_close,
        "backend->client",
    );
    let (upstream, downstream) = tokio::join!(upstream, downstream);

    // Both halves of each stream drop here, closing the sockets.
    Ok(Transfer {
        to_backend: initial.len() as u64 + upstream,
        to_client: downstream,
    })
}

/// Copy until end-of-stream or error, then signal end-of-stream to the
/// writer's peer. Returns the number of bytes copied.
async fn pipe<R, W>(reader: &mut R, writer: &mut W, half_close: bool, direction: &str) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(direction, error = %e, "read failed, closing direction");
                break;
            }
        };
        if let Err(e) = writer.write_all(&buf[..n]).await {
            tracing::debug!(direction, error = %e, "write failed, closing direction");
            return copied;
        }
        copied += n as u64;
    }

    if half_close {
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(direction, error = %e, "half-close failed");
        }
    }
    tracing::trace!(direction, bytes = copied, "direction finished");
    copied
}
