//! Route directive and listen address parsing.
//!
//! A directive is one positional argument (or one `routes` entry in the
//! config file) in one of three shapes:
//!
//! | Directive | Domain | Prefix |
//! |-----------|--------|--------|
//! | `domain:prefix:host:port` | `domain` | `prefix` |
//! | `prefix:host:port` | `""` (wildcard) | `prefix` |
//! | `host:port` | `""` (wildcard) | `""` (default) |
//!
//! Any shape may carry a `/ssl` suffix (backend speaks TLS) and/or a
//! `/http` suffix (inject `X-Forwarded-For`). `/ssl` is stripped first,
//! so the combined form is `host:port/http/ssl`.

use std::net::SocketAddr;

use crate::error::CentrifugeError;
use crate::proxy::routing::RouteEntry;

const SSL_SUFFIX: &str = "/ssl";
const HTTP_SUFFIX: &str = "/http";

/// One parsed route directive: the key it binds and the entry it binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub domain: String,
    pub prefix: String,
    pub entry: RouteEntry,
}

impl Directive {
    pub fn parse(raw: &str) -> Result<Self, CentrifugeError> {
        let invalid = |reason: String| CentrifugeError::InvalidDirective {
            directive: raw.to_string(),
            reason,
        };

        let (rest, tls) = strip_flag(raw, SSL_SUFFIX);
        let (rest, http) = strip_flag(rest, HTTP_SUFFIX);

        let segments: Vec<&str> = rest.split(':').collect();
        let (domain, prefix, host, port) = match segments.as_slice() {
            [domain, prefix, host, port] => (*domain, *prefix, *host, *port),
            [prefix, host, port] => ("", *prefix, *host, *port),
            [host, port] => ("", "", *host, *port),
            other => {
                return Err(invalid(format!(
                    "expected 2 to 4 ':'-separated segments, found {}",
                    other.len()
                )))
            }
        };

        if host.is_empty() {
            return Err(invalid("backend host is empty".into()));
        }
        match port.parse::<u16>() {
            Ok(p) if p != 0 => {}
            _ => return Err(invalid(format!("'{port}' is not a valid backend port"))),
        }

        Ok(Self {
            domain: domain.to_ascii_lowercase(),
            prefix: prefix.to_string(),
            entry: RouteEntry {
                backend: format!("{host}:{port}"),
                tls,
                http,
            },
        })
    }
}

/// Where to listen and whether to terminate TLS there.
///
/// The host may be an IP literal (IPv6 in brackets) or a name; names are
/// looked up by [`ListenSpec::resolve`] right before binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenSpec {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl ListenSpec {
    pub fn parse(raw: &str) -> Result<Self, CentrifugeError> {
        let invalid = |reason: &str| CentrifugeError::InvalidListen {
            listen: raw.to_string(),
            reason: reason.to_string(),
        };

        let (rest, tls) = strip_flag(raw, SSL_SUFFIX);
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port is not a number in 0..=65535"))?;
        // ":443" binds every IPv4 interface
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
            return Err(invalid("IPv6 hosts must be written in brackets"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            tls,
        })
    }

    /// `host:port` without the TLS flag.
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the host to the first address the system returns.
    pub async fn resolve(&self) -> Result<SocketAddr, CentrifugeError> {
        let failed = |reason: String| CentrifugeError::InvalidListen {
            listen: self.to_string(),
            reason,
        };
        tokio::net::lookup_host(self.authority())
            .await
            .map_err(|e| failed(e.to_string()))?
            .next()
            .ok_or_else(|| failed("host resolved to no addresses".into()))
    }
}

impl std::fmt::Display for ListenSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if self.tls {
            f.write_str(SSL_SUFFIX)?;
        }
        Ok(())
    }
}

fn strip_flag<'a>(raw: &'a str, suffix: &str) -> (&'a str, bool) {
    raw.strip_suffix(suffix).map_or((raw, false), |rest| (rest, true))
}
