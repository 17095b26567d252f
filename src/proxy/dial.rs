//! Outbound connections to backends.
//!
//! One attempt per connection, bounded by the connect timeout (TLS
//! handshake included). Failures are reported to the caller, which drops
//! the client connection.

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use super::routing::RouteEntry;
use super::stream::ProxyStream;
use crate::error::ConnectionError;
use crate::tls::{self, BackendVerification};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Clone)]
pub struct Dialer {
    connect_timeout: Duration,
    connector: TlsConnector,
}

impl Dialer {
    #[must_use]
    pub fn new(connect_timeout: Duration, verification: BackendVerification) -> Self {
        let config = tls::client_config(verification);
        Self {
            connect_timeout,
            connector: TlsConnector::from(Arc::new(config)),
        }
    }

    pub async fn dial(&self, entry: &RouteEntry) -> Result<ProxyStream, ConnectionError> {
        tokio::time::timeout(self.connect_timeout, self.connect(entry))
            .await
            .map_err(|_| ConnectionError::DialTimeout {
                addr: entry.backend.clone(),
                timeout: self.connect_timeout,
            })?
    }

    async fn connect(&self, entry: &RouteEntry) -> Result<ProxyStream, ConnectionError> {
        let dial_err = |source: std::io::Error| ConnectionError::Dial {
            addr: entry.backend.clone(),
            source,
        };

        let tcp = TcpStream::connect(entry.backend.as_str())
            .await
            .map_err(dial_err)?;
        if !entry.tls {
            return Ok(ProxyStream::Plain(tcp));
        }

        let server_name = ServerName::try_from(entry.host().to_string()).map_err(|e| {
            dial_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        let tls = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(dial_err)?;
        Ok(ProxyStream::Tls(Box::new(tls.into())))
    }
}

impl Default for Dialer {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, BackendVerification::default())
    }
}
