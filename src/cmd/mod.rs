//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], [`validate`], [`health`], or
//! [`scrub`]. Each handler lives in its own submodule.

pub mod health;
pub mod init;
pub mod run;
pub mod scrub;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::BeaconScrubError;

pub async fn dispatch(cli: Cli) -> Result<(), BeaconScrubError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        Some(Commands::Scrub(ref args)) => scrub::execute(args),
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  beacon-scrub v{version}: analytics beacon scrubbing proxy\n\n  \
         No command provided. To get started:\n\n    \
         beacon-scrub init                  Generate a starter config\n    \
         beacon-scrub run                   Start the proxy (auto-detects ./beacon-scrub.yaml)\n    \
         beacon-scrub run -c proxy.yaml     Start with a specific config file\n    \
         beacon-scrub scrub body.txt        Rewrite one captured beacon body\n    \
         beacon-scrub --help                See all commands and options\n"
    );
}
