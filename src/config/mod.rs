//! Configuration loading, merging, and validation.
//!
//! [`resolve`] layers the built-in defaults, an optional config file and
//! the command-line flags (in that order of precedence) into one
//! [`Config`]. Submodules provide the data model, the directive grammar,
//! file parsing, and validation.

pub mod directive;
pub mod model;
pub mod sources;
pub mod validation;

use std::path::PathBuf;

use crate::cli::RoutingArgs;
use crate::error::CentrifugeError;
use model::Config;

/// Build the effective config from an optional file plus CLI overrides.
///
/// Returns the file that was loaded, if any, alongside the config.
/// Directives given on the command line are appended after the file's
/// routes, so they replace file routes bound to the same key.
pub async fn resolve(args: &RoutingArgs) -> Result<(Config, Option<PathBuf>), CentrifugeError> {
    let source = sources::discover(args.config.as_deref()).await;
    let mut config = match source {
        Some(ref path) => sources::load_file(path).await?,
        None => Config::default(),
    };
    apply_overrides(&mut config, args);
    Ok((config, source))
}

pub fn apply_overrides(config: &mut Config, args: &RoutingArgs) {
    if let Some(ref listen) = args.listen {
        config.listen.clone_from(listen);
    }
    config.hosts.extend(args.hosts.iter().cloned());
    if let Some(ref dir) = args.cert_dir {
        config.cert_dir.clone_from(dir);
    }
    if let Some(ms) = args.sniff_timeout {
        config.tuning.sniff_timeout = ms;
    }
    if let Some(ms) = args.connect_timeout {
        config.tuning.connect_timeout = ms;
    }
    if let Some(secs) = args.keepalive {
        config.tuning.keepalive = secs;
    }
    if args.verify_backend {
        config.backend_tls.verify = true;
    }
    config.routes.extend(args.directives.iter().cloned());
}
