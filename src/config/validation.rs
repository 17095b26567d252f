//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a merged [`Config`] for every problem
//! at once: an unparsable listen address, malformed route directives, a
//! TLS listener with no hosts to serve, and zero timeouts. It returns a
//! list of [`ValidationError`] values with suggestions where one helps.
//! [`duplicate_keys`] reports directives that silently replace an earlier
//! one; those are warnings, not errors.

use std::collections::HashMap;

use super::directive::{Directive, ListenSpec};
use super::model::Config;
use crate::error::{CentrifugeError, ValidationError};
use crate::proxy::routing::RoutingTable;

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match ListenSpec::parse(&config.listen) {
        Ok(spec) => {
            if spec.tls && config.hosts.is_empty() {
                errors.push(ValidationError {
                    route: "(root)".into(),
                    field: "hosts".into(),
                    message: "a TLS listener needs at least one host to serve".into(),
                    suggestion: Some(format!(
                        "pass -n <host>, or listen on '{}' without '/ssl'",
                        spec.authority()
                    )),
                });
            }
        }
        Err(e) => errors.push(ValidationError {
            route: "(root)".into(),
            field: "listen".into(),
            message: reason_of(e),
            suggestion: Some("expected host:port, optionally followed by /ssl".into()),
        }),
    }

    for host in &config.hosts {
        if host.is_empty() || host.contains([':', '/']) {
            errors.push(ValidationError {
                route: "(root)".into(),
                field: "hosts".into(),
                message: format!("'{host}' is not a host name"),
                suggestion: None,
            });
        }
    }

    for (name, value) in [
        ("tuning.sniff_timeout", config.tuning.sniff_timeout),
        ("tuning.connect_timeout", config.tuning.connect_timeout),
    ] {
        if value == 0 {
            errors.push(ValidationError {
                route: "(root)".into(),
                field: name.into(),
                message: "timeout must be greater than 0".into(),
                suggestion: None,
            });
        }
    }

    for (i, raw) in config.routes.iter().enumerate() {
        if let Err(e) = Directive::parse(raw) {
            errors.push(ValidationError {
                route: format!("routes[{i}] '{raw}'"),
                field: "directive".into(),
                message: reason_of(e),
                suggestion: suggest_directive(raw),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Directives whose `(domain, prefix)` key was already bound by an
/// earlier directive. Each item is `(earlier, later)`.
#[must_use]
pub fn duplicate_keys(routes: &[String]) -> Vec<(String, String)> {
    let mut seen: HashMap<(String, String), &String> = HashMap::new();
    let mut duplicates = Vec::new();
    for raw in routes {
        let Ok(d) = Directive::parse(raw) else {
            continue;
        };
        if let Some(earlier) = seen.insert((d.domain, d.prefix), raw) {
            duplicates.push((earlier.clone(), raw.clone()));
        }
    }
    duplicates
}

fn reason_of(e: CentrifugeError) -> String {
    match e {
        CentrifugeError::InvalidDirective { reason, .. }
        | CentrifugeError::InvalidListen { reason, .. } => reason,
        other => other.to_string(),
    }
}

fn suggest_directive(raw: &str) -> Option<String> {
    if raw.ends_with("/ssl/http") {
        let base = raw.trim_end_matches("/ssl/http");
        return Some(format!("flags go in the order '/http/ssl': '{base}/http/ssl'"));
    }
    let segments = raw.split(':').count();
    if segments > 4 {
        return Some("IPv6 backends are not supported; use a host name".into());
    }
    None
}

#[must_use]
pub fn format_validation_report(source: &str, config: &Config, table: &RoutingTable) -> String {
    let mut lines = vec![format!(
        "  listen {}, {} hosts, {} routes\n",
        config.listen,
        config.hosts.len(),
        table.len()
    )];

    let mut current: Option<&str> = None;
    for (domain, prefix, entry) in table.iter() {
        if current != Some(domain) {
            let label = if domain.is_empty() { "*" } else { domain };
            lines.push(format!("  {label}"));
            current = Some(domain);
        }
        let prefix = if prefix.is_empty() {
            "(default)".to_string()
        } else {
            format!("{prefix:?}")
        };
        let mut flags = Vec::new();
        if entry.tls {
            flags.push("tls");
        }
        if entry.http {
            flags.push("x-forwarded-for");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        lines.push(format!("    {prefix} -> {}{flags}", entry.backend));
    }

    format!("{} is valid\n{}", source, lines.join("\n"))
}
