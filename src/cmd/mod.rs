//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler. Only [`run`] exists today; invoking the binary
//! without a command prints a short usage banner.

pub mod run;

use crate::cli::{Cli, Commands};
use crate::error::AuthgateError;

pub async fn dispatch(cli: Cli) -> Result<(), AuthgateError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  authgate v{version} \u{2014} authenticating reverse proxy\n\n  \
         No command provided. To get started:\n\n    \
         authgate run                                   Proxy http://localhost:3000 as admin\n    \
         authgate run --upstream http://grafana:3000    Proxy a specific backend\n    \
         authgate --help                                See all commands and options\n"
    );
}
