//! Per-connection pipeline: sniff, route, dial, rewrite, relay.
//!
//! [`handle_connection`] runs inside the task the listener spawns for
//! every accepted socket. Submodules handle first-read capture
//! ([`sniff`]), route matching ([`routing`]), backend connections
//! ([`dial`]), `X-Forwarded-For` injection ([`headers`]), the duplex copy
//! ([`relay`]) and the stream type both legs share ([`stream`]).

pub mod dial;
pub mod headers;
pub mod relay;
pub mod routing;
pub mod sniff;
pub mod stream;

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use crate::error::ConnectionError;
use dial::Dialer;
use relay::Transfer;
use routing::RoutingTable;

pub const DEFAULT_SNIFF_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Everything a connection task needs, fixed at startup.
pub struct ProxyState {
    pub table: RoutingTable,
    pub dialer: Dialer,
    pub sniff_timeout: Duration,
    /// `None` leaves the OS keep-alive defaults alone.
    pub keepalive: Option<Duration>,
}

impl ProxyState {
    #[must_use]
    pub fn new(table: RoutingTable, dialer: Dialer) -> Self {
        Self {
            table,
            dialer,
            sniff_timeout: DEFAULT_SNIFF_TIMEOUT,
            keepalive: Some(relay::DEFAULT_KEEPALIVE),
        }
    }
}

pub async fn handle_connection(
    state: &ProxyState,
    tcp: TcpStream,
    peer: SocketAddr,
    acceptor: Option<&TlsAcceptor>,
) -> Result<Transfer, ConnectionError> {
    let sniffed = sniff::sniff(tcp, acceptor, state.sniff_timeout).await?;
    tracing::debug!(
        domain = %sniffed.domain,
        bytes = sniffed.initial.len(),
        tls = sniffed.stream.is_tls(),
        "initial data sniffed"
    );

    let Some(entry) = state.table.resolve(&sniffed.domain, &sniffed.initial) else {
        return Err(ConnectionError::RouteNotFound {
            domain: sniffed.domain,
        });
    };

    let backend = state.dialer.dial(entry).await?;
    tracing::info!(
        domain = %sniffed.domain,
        backend = %entry.backend,
        backend_tls = entry.tls,
        http = entry.http,
        "routed"
    );

    let initial = if entry.http {
        headers::inject_forwarded_for(&sniffed.initial, peer.ip().to_canonical())
    } else {
        Cow::Borrowed(sniffed.initial.as_slice())
    };

    relay::relay(sniffed.stream, backend, &initial, state.keepalive)
        .await
        .map_err(ConnectionError::Relay)
}
