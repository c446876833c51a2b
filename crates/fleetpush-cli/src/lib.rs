//! # Fleetpush CLI
//!
//! Command-line access to a fleetpush pub/sub server: listen for
//! notifications, send them to one user or a whole role, publish raw JSON,
//! and query server status.
//!
//! ## Usage
//!
//! ```bash
//! # Print notifications for a driver until Ctrl-C
//! fleetpush --user-id d-1 --user-type driver listen
//!
//! # Notify one customer
//! fleetpush --user-id w-1 --user-type warehouse send a@x.com "Order ready" "Dock 3" --kind success
//!
//! # Everyone with the driver role
//! fleetpush broadcast driver "Shift" "New shift posted"
//!
//! # Raw publish and server queries
//! fleetpush publish order-status:42 '{"state":"picked"}'
//! fleetpush --format json users
//! ```

pub mod cli;
pub mod error;
pub mod executor;
pub mod logging;
pub mod output;

pub use cli::{Cli, Commands, NotificationArgs, OutputFormat};
pub use error::{CliError, CliResult, ErrorCategory};
pub use executor::CommandExecutor;

use anyhow::Context;
use clap::Parser;

/// Parse arguments, initialise logging and run the selected command.
///
/// Command failures are printed with suggestions and exit the process with
/// status 1. Setup failures are returned.
///
/// # Errors
///
/// Returns an error if logging or the client configuration cannot be set up.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json).context("failed to initialise logging")?;

    let executor = CommandExecutor::from_cli(&cli).context("invalid client configuration")?;
    if let Err(e) = executor.execute(cli.command).await {
        executor.display_error(&e);
        std::process::exit(1);
    }
    Ok(())
}
