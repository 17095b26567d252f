//! `centrifuge validate`: check directives and config without listening.
//!
//! Merges the same inputs `run` would use, validates them, builds the
//! routing table and prints it in resolution order, either as
//! human-readable text or as JSON.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::{self, validation};
use crate::error::CentrifugeError;
use crate::proxy::routing::RoutingTable;

pub async fn execute(args: &ValidateArgs) -> Result<(), CentrifugeError> {
    let (config, source) = config::resolve(&args.routing).await?;
    let source = source.map_or_else(|| "command line".to_string(), |p| p.display().to_string());

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {source} has {} errors\n", errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "route": e.route,
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(CentrifugeError::ConfigValidation { errors });
    }

    let table = RoutingTable::build(&config.routes)?;
    let duplicates = validation::duplicate_keys(&config.routes);

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&source, &config, &table)
            );
            for (earlier, later) in &duplicates {
                println!("  warning: '{later}' replaces '{earlier}'");
            }
        }
        ValidateFormat::Json => {
            let routes: Vec<serde_json::Value> = table
                .iter()
                .map(|(domain, prefix, entry)| {
                    serde_json::json!({
                        "domain": domain,
                        "prefix": prefix,
                        "backend": entry.backend,
                        "tls": entry.tls,
                        "http": entry.http,
                    })
                })
                .collect();
            let duplicates: Vec<serde_json::Value> = duplicates
                .iter()
                .map(|(earlier, later)| serde_json::json!({ "replaced": earlier, "by": later }))
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "listen": config.listen,
                    "hosts": config.hosts,
                    "routes": routes,
                    "duplicates": duplicates,
                })
            );
        }
    }

    Ok(())
}
