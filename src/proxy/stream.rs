//! Socket abstraction shared by the client and backend legs.
//!
//! [`ProxyStream`] wraps a plain TCP socket or a TLS session (server side
//! for terminated client connections, client side for TLS backends) behind
//! one `AsyncRead + AsyncWrite` type. The [`Duplex`] trait is what the
//! relay programs against: it asks whether `shutdown` closes only the
//! write direction, and for the TCP socket underneath (if any) so
//! keep-alive can be tuned.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsStream;

/// A bidirectional stream the relay can drive.
pub trait Duplex: AsyncRead + AsyncWrite + Unpin + Send {
    /// `true` when `AsyncWriteExt::shutdown` signals end-of-stream to the
    /// peer and leaves the read direction usable.
    fn supports_half_close(&self) -> bool;

    /// The TCP socket carrying this stream, if there is one.
    fn tcp(&self) -> Option<&TcpStream>;
}

pub enum ProxyStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ProxyStream {
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// SNI host name the client asked for, lowercased. Empty for plain
    /// streams, client-side TLS, and clients that sent no SNI.
    #[must_use]
    pub fn server_name(&self) -> String {
        match self {
            Self::Tls(tls) => match tls.as_ref() {
                TlsStream::Server(server) => server
                    .get_ref()
                    .1
                    .server_name()
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_default(),
                TlsStream::Client(_) => String::new(),
            },
            Self::Plain(_) => String::new(),
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp_stream().peer_addr()
    }

    fn tcp_stream(&self) -> &TcpStream {
        match self {
            Self::Plain(tcp) => tcp,
            Self::Tls(tls) => tls.get_ref().0,
        }
    }
}

impl Duplex for ProxyStream {
    fn supports_half_close(&self) -> bool {
        // TCP shuts down the write half; rustls sends close_notify and then
        // shuts down the write half of the socket underneath.
        true
    }

    fn tcp(&self) -> Option<&TcpStream> {
        Some(self.tcp_stream())
    }
}

impl Duplex for tokio::io::DuplexStream {
    fn supports_half_close(&self) -> bool {
        true
    }

    fn tcp(&self) -> Option<&TcpStream> {
        None
    }
}

impl AsyncRead for ProxyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ProxyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Enable TCP keep-alive with `period` as both idle time and probe interval.
pub fn set_keepalive(stream: &TcpStream, period: Duration) -> io::Result<()> {
    let keepalive = TcpKeepalive::new().with_time(period);
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "windows",
    ))]
    let keepalive = keepalive.with_interval(period);

    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}
