//! Serde data structures for the Centrifuge configuration file.
//!
//! Contains [`Config`] (the root), [`Tuning`] and [`BackendTls`]. All
//! types derive `Serialize` and `Deserialize` with `deny_unknown_fields`
//! for strict parsing. Routes stay in directive form so the file and the
//! command line share one grammar.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::tls::BackendVerification;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:443/ssl";

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from("certs")
}

const fn default_sniff_timeout() -> u64 {
    10_000
}

const fn default_connect_timeout() -> u64 {
    5000
}

const fn default_keepalive() -> u64 {
    10
}

fn is_default_listen(v: &str) -> bool {
    v == DEFAULT_LISTEN
}

fn is_default_cert_dir(v: &Path) -> bool {
    v == Path::new("certs")
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_default_tuning(v: &Tuning) -> bool {
    v.sniff_timeout == default_sniff_timeout()
        && v.connect_timeout == default_connect_timeout()
        && v.keepalive == default_keepalive()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `host:port`, optionally suffixed with `/ssl` to terminate TLS.
    #[serde(default = "default_listen", skip_serializing_if = "is_default_listen")]
    pub listen: String,

    /// Host names the TLS listener will serve certificates for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    #[serde(default = "default_cert_dir", skip_serializing_if = "is_default_cert_dir")]
    pub cert_dir: PathBuf,

    #[serde(default, skip_serializing_if = "is_default_tuning")]
    pub tuning: Tuning,

    #[serde(default, skip_serializing_if = "BackendTls::is_default")]
    pub backend_tls: BackendTls,

    #[serde(default)]
    pub routes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            hosts: Vec::new(),
            cert_dir: default_cert_dir(),
            tuning: Tuning::default(),
            backend_tls: BackendTls::default(),
            routes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Tuning {
    /// Deadline for the TLS handshake plus first read, in milliseconds.
    #[serde(default = "default_sniff_timeout")]
    pub sniff_timeout: u64,

    /// Deadline for dialing a backend, in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// TCP keep-alive idle time and probe interval, in seconds. 0 disables it.
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            sniff_timeout: default_sniff_timeout(),
            connect_timeout: default_connect_timeout(),
            keepalive: default_keepalive(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendTls {
    #[serde(default, skip_serializing_if = "is_false")]
    pub verify: bool,
}

impl BackendTls {
    fn is_default(&self) -> bool {
        !self.verify
    }

    #[must_use]
    pub const fn verification(&self) -> BackendVerification {
        if self.verify {
            BackendVerification::WebPki
        } else {
            BackendVerification::Skip
        }
    }
}
