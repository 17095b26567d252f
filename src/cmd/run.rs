//! `centrifuge run`: start the router.
//!
//! Resolves the configuration, builds the routing table, loads listener
//! certificates when the listen address ends in `/ssl`, then accepts
//! connections until SIGTERM or Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config::directive::ListenSpec;
use crate::config::model::Config;
use crate::config::{self, validation};
use crate::error::CentrifugeError;
use crate::logging;
use crate::proxy::dial::Dialer;
use crate::proxy::routing::RoutingTable;
use crate::proxy::ProxyState;
use crate::server::{self, Listener};
use crate::tls::{self, CertificateStore};

pub async fn execute(args: RunArgs) -> Result<(), CentrifugeError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args
        .sentry_dsn
        .as_ref()
        .map(|dsn| crate::sentry_integration::init(dsn, args.sentry_environment.as_deref()));

    let (config, source) = config::resolve(&args.routing).await?;
    if let Some(path) = source {
        tracing::info!(path = %path.display(), "config loaded");
    }
    validation::validate(&config).map_err(|errors| CentrifugeError::ConfigValidation { errors })?;

    let listen = ListenSpec::parse(&config.listen)?;
    let table = RoutingTable::build(&config.routes)?;
    if table.is_empty() {
        tracing::warn!("no routes configured, every connection will be dropped");
    }
    for (domain, prefix, entry) in table.iter() {
        let domain = if domain.is_empty() { "*" } else { domain };
        tracing::debug!(
            domain,
            prefix = %prefix.escape_debug(),
            backend = %entry.backend,
            tls = entry.tls,
            http = entry.http,
            "route"
        );
    }

    let acceptor = if listen.tls {
        let store = CertificateStore::load_dir(&config.cert_dir, &config.hosts)?;
        tracing::info!(
            cert_dir = %config.cert_dir.display(),
            hosts = store.len(),
            "listener certificates loaded"
        );
        Some(tls::acceptor(Arc::new(store)))
    } else {
        None
    };

    let state = proxy_state(&config, table);
    let route_count = state.table.len();
    let addr = listen.resolve().await?;
    let listener = Listener::bind(addr, acceptor, Arc::new(state)).await?;

    tracing::info!(
        addr = %listener.local_addr()?,
        tls = listen.tls,
        routes = route_count,
        verify_backend = config.backend_tls.verify,
        "centrifuge started"
    );

    listener.run(server::shutdown_signal()).await;

    tracing::info!("centrifuge stopped");
    Ok(())
}

/// Connection-handling state derived from the tuning section.
#[must_use]
pub fn proxy_state(config: &Config, table: RoutingTable) -> ProxyState {
    let dialer = Dialer::new(
        Duration::from_millis(config.tuning.connect_timeout),
        config.backend_tls.verification(),
    );
    let mut state = ProxyState::new(table, dialer);
    state.sniff_timeout = Duration::from_millis(config.tuning.sniff_timeout);
    state.keepalive =
        (config.tuning.keepalive > 0).then(|| Duration::from_secs(config.tuning.keepalive));
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuning_flows_into_state() {
        let mut config = Config::default();
        config.tuning.sniff_timeout = 250;
        config.tuning.keepalive = 0;
        let state = proxy_state(&config, RoutingTable::default());
        assert_eq!(state.sniff_timeout, Duration::from_millis(250));
        assert!(state.keepalive.is_none());
    }

    #[test]
    fn default_keepalive_is_ten_seconds() {
        let state = proxy_state(&Config::default(), RoutingTable::default());
        assert_eq!(state.keepalive, Some(Duration::from_secs(10)));
    }
}
