//! sipolicy - Silicon policy config block tool
//!
//! Builds the per-phase config block tables silicon init code consumes,
//! and decodes or checks tables and handoff HOB lists taken from a
//! platform.
//!
//! # Architecture
//!
//! - `sipolicy-core` holds the registry: table format, typed lookups,
//!   sealing and the handoff record.
//! - `sipolicy-blocks` defines the silicon blocks, the per-phase component
//!   tables and profile overrides.
//!
//! This binary only wires files and arguments to those crates.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger, verbosity raises the default filter
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Blocks { phase } => {
            commands::list_blocks(phase);
            Ok(())
        }
        Commands::Fields { block } => commands::list_fields(&block),
        Commands::Build {
            phase,
            profile,
            capacity,
            handoff,
            output,
        } => commands::build::cmd_build(phase, profile.as_deref(), capacity, handoff, &output),
        Commands::Dump { file, hex } => commands::dump::cmd_dump(&file, hex),
        Commands::Check { file, phase } => commands::check::cmd_check(&file, phase),
    }
}
