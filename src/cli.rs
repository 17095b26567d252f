//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate), and their argument structs. The routing
//! inputs shared by both subcommands live in [`RoutingArgs`]. Every flag
//! has an environment variable equivalent for container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CENTRIFUGE_GIT_SHORT"),
    ", built ",
    env!("CENTRIFUGE_BUILD_TIME"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "centrifuge",
    version,
    long_version = LONG_VERSION,
    about = "TCP/TLS connection router: one port, many backends",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        centrifuge run -p :8080 SSH-:127.0.0.1:22 127.0.0.1:8000/http\n  \
        centrifuge run -n example.com example.com::127.0.0.1:8443/ssl\n  \
        centrifuge validate -c centrifuge.yaml"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the router
    Run(Box<RunArgs>),

    /// Check directives and config without listening
    Validate(ValidateArgs),
}

/// Inputs that shape the routing table and listener.
#[derive(Args, Debug, Default)]
pub struct RoutingArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CENTRIFUGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, host:port with an optional /ssl suffix [default: 0.0.0.0:443/ssl]
    #[arg(short = 'p', long, env = "CENTRIFUGE_LISTEN")]
    pub listen: Option<String>,

    /// Host name to serve a certificate for (repeatable)
    #[arg(
        short = 'n',
        long = "host",
        env = "CENTRIFUGE_HOSTS",
        value_delimiter = ','
    )]
    pub hosts: Vec<String>,

    /// Directory holding <host>/fullchain.pem and <host>/privkey.pem [default: certs]
    #[arg(long, env = "CENTRIFUGE_CERT_DIR")]
    pub cert_dir: Option<PathBuf>,

    /// Route directives: [[domain:]prefix:]host:port[/http][/ssl]
    #[arg(value_name = "DIRECTIVE")]
    pub directives: Vec<String>,

    // -- Tuning --
    /// Deadline for handshake and first read, in milliseconds [default: 10000]
    #[arg(long, env = "SNIFF_TIMEOUT_MS", help_heading = "Tuning")]
    pub sniff_timeout: Option<u64>,

    /// Backend connect timeout in milliseconds [default: 5000]
    #[arg(long, env = "CONNECT_TIMEOUT_MS", help_heading = "Tuning")]
    pub connect_timeout: Option<u64>,

    /// TCP keep-alive period in seconds, 0 to disable [default: 10]
    #[arg(long, env = "KEEPALIVE_SECS", help_heading = "Tuning")]
    pub keepalive: Option<u64>,

    /// Verify certificates of /ssl backends against the Mozilla roots
    #[arg(long, env = "VERIFY_BACKEND", help_heading = "Tuning")]
    pub verify_backend: bool,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        centrifuge run -p :443/ssl -n example.com 127.0.0.1:8080     TLS in front of one backend\n  \
        centrifuge run -p :8080 SSH-:127.0.0.1:22 127.0.0.1:8000       SSH and HTTP on one port\n  \
        centrifuge run -c centrifuge.yaml --pretty                    Config file, local dev mode")]
pub struct RunArgs {
    #[command(flatten)]
    pub routing: RoutingArgs,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Observability --
    /// Sentry DSN (enables error tracking)
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_DSN", help_heading = "Observability")]
    pub sentry_dsn: Option<String>,

    /// Sentry environment tag
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_ENVIRONMENT", help_heading = "Observability")]
    pub sentry_environment: Option<String>,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub routing: RoutingArgs,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_directives_and_repeated_hosts() {
        let cli = Cli::parse_from([
            "centrifuge",
            "run",
            "-p",
            ":443/ssl",
            "-n",
            "a.test",
            "-n",
            "b.test",
            "a.test::127.0.0.1:80",
            "127.0.0.1:81",
        ]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.routing.listen.as_deref(), Some(":443/ssl"));
        assert_eq!(args.routing.hosts, vec!["a.test", "b.test"]);
        assert_eq!(args.routing.directives.len(), 2);
    }
}
