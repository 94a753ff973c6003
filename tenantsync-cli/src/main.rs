//! tenantsync: reconcile a tenant's configuration with a desired-state file.
//!
//! # Usage
//!
//! ```text
//! tenantsync deploy <file> [--dry-run] [--json] [--config <path>] [-v]
//! tenantsync export <file> [--config <path>] [-v]
//! ```
//!
//! Configuration comes from `~/.tenantsync/config.yaml` (or `--config`),
//! overridden by `TENANTSYNC_*` environment variables.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{deploy::DeployArgs, export::ExportArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tenantsync",
    version,
    about = "Reconcile tenant configuration against a desired-state document",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (RUST_LOG still wins).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a desired-state document to the tenant, or preview it with `--dry-run`.
    Deploy(DeployArgs),

    /// Write the tenant's current configuration to a document.
    Export(ExportArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Deploy(args) => args.run(),
        Commands::Export(args) => args.run(),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
