//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`] or [`validate`]. Each handler lives in its
//! own submodule.

pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::CentrifugeError;

pub async fn dispatch(cli: Cli) -> Result<(), CentrifugeError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  centrifuge v{version}: one port, many backends\n\n  \
         No command provided. To get started:\n\n    \
         centrifuge run -p :8080 127.0.0.1:8000       Forward everything to one backend\n    \
         centrifuge run -c centrifuge.yaml             Start from a config file\n    \
         centrifuge validate SSH-:127.0.0.1:22 ...     Check directives without listening\n    \
         centrifuge --help                             See all commands and options\n"
    );
}
