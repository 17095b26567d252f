//! TLS material for both sides of the router.
//!
//! Listener side: a [`CertificateProvider`] hands out certificates keyed by
//! SNI host name; [`SniCertResolver`] plugs any provider into rustls, and
//! [`CertificateStore`] is the shipped provider, loaded once at startup
//! from `<cert_dir>/<host>/{fullchain,privkey}.pem` for whitelisted hosts.
//! Obtaining or renewing those files (ACME) happens outside this crate.
//!
//! Backend side: [`client_config`] builds the rustls client configuration,
//! either verifying against the Mozilla roots or accepting any certificate.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme};
use tokio_rustls::TlsAcceptor;

use crate::error::CentrifugeError;

/// How backend certificates are checked on `/ssl` routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendVerification {
    /// Accept any certificate. Backends are commonly self-signed.
    #[default]
    Skip,
    /// Verify against the bundled Mozilla root set.
    WebPki,
}

/// Source of listener certificates, looked up per handshake.
pub trait CertificateProvider: fmt::Debug + Send + Sync {
    fn certificate(&self, server_name: &str) -> Result<Arc<CertifiedKey>, CentrifugeError>;
}

/// Certificates held in memory, keyed by lowercase host name.
///
/// Hosts without an entry are refused, which doubles as the host
/// whitelist.
#[derive(Default)]
pub struct CertificateStore {
    keys: HashMap<String, Arc<CertifiedKey>>,
}

impl fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hosts: Vec<&String> = self.keys.keys().collect();
        hosts.sort();
        f.debug_struct("CertificateStore")
            .field("hosts", &hosts)
            .finish()
    }
}

impl CertificateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `fullchain.pem` and `privkey.pem` for every host from
    /// `<dir>/<host>/`.
    pub fn load_dir<S: AsRef<str>>(dir: &Path, hosts: &[S]) -> Result<Self, CentrifugeError> {
        let mut store = Self::new();
        for host in hosts {
            let host = host.as_ref();
            let host_dir = dir.join(host);
            let read = |name: &str| {
                let path = host_dir.join(name);
                std::fs::read(&path).map_err(|e| CentrifugeError::Certificate {
                    host: host.to_string(),
                    reason: format!("{}: {e}", path.display()),
                })
            };
            let chain = read("fullchain.pem")?;
            let key = read("privkey.pem")?;
            store.insert_pem(host, &chain, &key)?;
            tracing::info!(host = %host, dir = %host_dir.display(), "certificate loaded");
        }
        Ok(store)
    }

    /// Add (or replace) the certificate for `host` from PEM data.
    pub fn insert_pem(
        &mut self,
        host: &str,
        chain_pem: &[u8],
        key_pem: &[u8],
    ) -> Result<(), CentrifugeError> {
        let failed = |reason: String| CentrifugeError::Certificate {
            host: host.to_string(),
            reason,
        };

        let chain: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &*chain_pem)
            .collect::<Result<_, _>>()
            .map_err(|e| failed(format!("failed to parse certificate chain: {e}")))?;
        if chain.is_empty() {
            return Err(failed("no certificate found in chain".into()));
        }

        let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut &*key_pem)
            .map_err(|e| failed(format!("failed to parse private key: {e}")))?
            .ok_or_else(|| failed("no private key found".into()))?;

        let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)
            .map_err(|e| failed(format!("unsupported private key: {e}")))?;

        self.keys.insert(
            host.to_ascii_lowercase(),
            Arc::new(CertifiedKey::new(chain, signing_key)),
        );
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl CertificateProvider for CertificateStore {
    fn certificate(&self, server_name: &str) -> Result<Arc<CertifiedKey>, CentrifugeError> {
        self.keys
            .get(&server_name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| CentrifugeError::Certificate {
                host: server_name.to_string(),
                reason: "host is not in the whitelist".into(),
            })
    }
}

/// Adapts a [`CertificateProvider`] to rustls' SNI callback.
#[derive(Debug)]
pub struct SniCertResolver {
    provider: Arc<dyn CertificateProvider>,
}

impl SniCertResolver {
    #[must_use]
    pub fn new(provider: Arc<dyn CertificateProvider>) -> Self {
        Self { provider }
    }
}

impl ResolvesServerCert for SniCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let Some(name) = client_hello.server_name() else {
            tracing::debug!("TLS client sent no SNI, refusing handshake");
            return None;
        };
        match self.provider.certificate(name) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(sni = %name, error = %e, "no certificate for SNI");
                None
            }
        }
    }
}

/// Install `ring` as the process-wide rustls provider.
///
/// rustls cannot pick a default when more than one provider is compiled
/// in, so this runs before any config is built. Repeat calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Acceptor for the TLS-terminating listener.
#[must_use]
pub fn acceptor(provider: Arc<dyn CertificateProvider>) -> TlsAcceptor {
    install_crypto_provider();
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(SniCertResolver::new(provider)));
    TlsAcceptor::from(Arc::new(config))
}

/// Client configuration for `/ssl` backends.
#[must_use]
pub fn client_config(verification: BackendVerification) -> ClientConfig {
    install_crypto_provider();
    match verification {
        BackendVerification::WebPki => {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        }
        BackendVerification::Skip => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipVerification))
            .with_no_client_auth(),
    }
}

/// Accepts every backend certificate.
#[derive(Debug)]
struct SkipVerification;

impl ServerCertVerifier for SkipVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
