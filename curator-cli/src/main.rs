//! Curator — keep a catalog's records mirrored in the registry.
//!
//! # Usage
//!
//! ```text
//! curator [--config <path>] [-v] run [--dev] [--workers N] [--rid <rid>]...
//! curator [--config <path>] status [--json]
//! curator [--config <path>] diff <rid> [--dev]
//! curator [--config <path>] mappings [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{diff::DiffArgs, mappings::MappingsArgs, run::RunArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "curator",
    version,
    about = "Reconcile catalog records against the registry",
    long_about = None,
)]
struct Cli {
    /// Config file (default: ~/.curator/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Raise log verbosity to debug. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Contribute new records and update changed ones.
    Run(RunArgs),

    /// Show what a run would do for every candidate record.
    Status(StatusArgs),

    /// Preview the manifest diff an update would submit for one record.
    Diff(DiffArgs),

    /// List rid → registry id mappings.
    Mappings(MappingsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => args.run(config),
        Commands::Status(args) => args.run(config),
        Commands::Diff(args) => args.run(config),
        Commands::Mappings(args) => args.run(config),
    }
}

/// Log to stderr; stdout is reserved for command output.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose > 0 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
