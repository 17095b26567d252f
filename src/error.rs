//! Unified error types for Centrifuge.
//!
//! Defines [`CentrifugeError`] (startup and configuration failures, the
//! only errors that stop the process), [`ValidationError`] for config
//! validation findings, and [`ConnectionError`] for the per-connection
//! failures that are logged and never escape their task. All use
//! `thiserror` for `Display` and `Error` derives.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub route: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.route, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // infallible for String
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CentrifugeError {
    #[error("Invalid directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("Invalid listen address '{listen}': {reason}")]
    InvalidListen { listen: String, reason: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Certificate for '{host}' could not be loaded: {reason}")]
    Certificate { host: String, reason: String },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Failures scoped to a single accepted connection.
///
/// None of these stop the accept loop; the connection task logs the
/// error and drops both sockets.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    #[error("no initial data within {0:?}")]
    SniffTimeout(Duration),

    #[error("client closed before sending any data")]
    EmptySniff,

    #[error("initial read failed: {0}")]
    Sniff(#[source] std::io::Error),

    #[error("no route for domain '{domain}'")]
    RouteNotFound { domain: String },

    #[error("dial {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dial {addr} timed out after {timeout:?}")]
    DialTimeout { addr: String, timeout: Duration },

    #[error("writing initial data to backend failed: {0}")]
    Relay(#[source] std::io::Error),
}

impl ConnectionError {
    /// Short machine-friendly label used as a structured log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Handshake(_) | Self::SniffTimeout(_) | Self::EmptySniff | Self::Sniff(_) => {
                "sniff"
            }
            Self::RouteNotFound { .. } => "route_not_found",
            Self::Dial { .. } | Self::DialTimeout { .. } => "dial",
            Self::Relay(_) => "relay",
        }
    }
}
