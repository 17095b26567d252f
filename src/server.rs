//! Listener, accept loop, connection statistics, and graceful shutdown.
//!
//! [`Listener`] owns the bound socket, the optional TLS acceptor, and the
//! shared [`ProxyState`]. Every accepted socket gets its own task wrapped
//! in a `connection` span; per-connection failures are logged there and
//! never reach the accept loop. [`shutdown_signal`] resolves on SIGTERM or
//! Ctrl+C.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::error::CentrifugeError;
use crate::proxy::{self, ProxyState};

/// Pause after a failed accept so persistent errors (e.g. EMFILE) do not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct Stats {
    pub accepted: AtomicU64,
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub bytes_to_backend: AtomicU64,
    pub bytes_to_client: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            bytes_to_backend: AtomicU64::new(0),
            bytes_to_client: AtomicU64::new(0),
        }
    }
}

pub struct Listener {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    state: Arc<ProxyState>,
    stats: Arc<Stats>,
}

impl Listener {
    /// Bind `addr`. With an acceptor every connection is TLS-terminated
    /// and routed by SNI as well as by prefix.
    pub async fn bind(
        addr: SocketAddr,
        acceptor: Option<TlsAcceptor>,
        state: Arc<ProxyState>,
    ) -> Result<Self, CentrifugeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| CentrifugeError::Bind { addr, source })?;
        Ok(Self {
            listener,
            acceptor,
            state,
            stats: Arc::new(Stats::new()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[must_use]
    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    /// Accept until `shutdown` resolves. In-flight connections keep running.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            let (tcp, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            self.stats.accepted.fetch_add(1, Ordering::Relaxed);
            let state = Arc::clone(&self.state);
            let stats = Arc::clone(&self.stats);
            let acceptor = self.acceptor.clone();
            let span = tracing::info_span!(
                "connection",
                id = %uuid::Uuid::new_v4(),
                peer = %peer,
            );

            tokio::spawn(
                async move {
                    match proxy::handle_connection(&state, tcp, peer, acceptor.as_ref()).await {
                        Ok(transfer) => {
                            stats.forwarded.fetch_add(1, Ordering::Relaxed);
                            stats
                                .bytes_to_backend
                                .fetch_add(transfer.to_backend, Ordering::Relaxed);
                            stats
                                .bytes_to_client
                                .fetch_add(transfer.to_client, Ordering::Relaxed);
                            tracing::debug!(
                                to_backend = transfer.to_backend,
                                to_client = transfer.to_client,
                                "connection closed"
                            );
                        }
                        Err(e) => {
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                            if matches!(e.kind(), "route_not_found" | "dial") {
                                tracing::warn!(kind = e.kind(), error = %e, "connection dropped");
                            } else {
                                tracing::debug!(kind = e.kind(), error = %e, "connection dropped");
                            }
                        }
                    }
                }
                .instrument(span),
            );
        }

        tracing::info!(
            accepted = self.stats.accepted.load(Ordering::Relaxed),
            forwarded = self.stats.forwarded.load(Ordering::Relaxed),
            failed = self.stats.failed.load(Ordering::Relaxed),
            "listener stopped"
        );
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
