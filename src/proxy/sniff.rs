//! First-read capture and SNI extraction.
//!
//! [`sniff`] finishes the TLS handshake when the listener terminates TLS,
//! then performs exactly one read of at most [`SNIFF_BUFFER_SIZE`] bytes.
//! Those bytes pick the route and are later replayed to the backend, so
//! nothing is lost. The whole phase runs under one deadline.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use super::stream::ProxyStream;
use crate::error::ConnectionError;

pub const SNIFF_BUFFER_SIZE: usize = 1024;

/// What the sniffer learned about a fresh connection.
pub struct Sniffed {
    pub stream: ProxyStream,
    /// Bytes from the first read; never empty.
    pub initial: Vec<u8>,
    /// Negotiated SNI name, or empty for plain connections and clients
    /// that sent none.
    pub domain: String,
}

pub async fn sniff(
    tcp: TcpStream,
    acceptor: Option<&TlsAcceptor>,
    deadline: Duration,
) -> Result<Sniffed, ConnectionError> {
    tokio::time::timeout(deadline, sniff_inner(tcp, acceptor))
        .await
        .map_err(|_| ConnectionError::SniffTimeout(deadline))?
}

async fn sniff_inner(
    tcp: TcpStream,
    acceptor: Option<&TlsAcceptor>,
) -> Result<Sniffed, ConnectionError> {
    let mut stream = match acceptor {
        Some(acceptor) => {
            let tls = acceptor
                .accept(tcp)
                .await
                .map_err(ConnectionError::Handshake)?;
            ProxyStream::Tls(Box::new(tls.into()))
        }
        None => ProxyStream::Plain(tcp),
    };

    let mut buf = vec![0u8; SNIFF_BUFFER_SIZE];
    let n = stream.read(&mut buf).await.map_err(ConnectionError::Sniff)?;
    if n == 0 {
        return Err(ConnectionError::EmptySniff);
    }
    buf.truncate(n);

    let domain = stream.server_name();
    Ok(Sniffed {
        stream,
        initial: buf,
        domain,
    })
}
