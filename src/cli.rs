//! CLI argument parsing

use clap::{Parser, Subcommand};
use sipolicy_blocks::BootPhase;
use std::path::PathBuf;

/// Parse a capacity like "8 KiB", "0x2000" or "4096"
fn parse_capacity(s: &str) -> Result<u32, String> {
    sipolicy_blocks::profile::parse_size(s)
}

#[derive(Parser)]
#[command(name = "sipolicy")]
#[command(author, version, about = "Silicon policy config block tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List known config blocks
    Blocks {
        /// Only blocks of this phase (pre-mem, post-mem)
        #[arg(short, long)]
        phase: Option<BootPhase>,
    },

    /// Show the fields of a config block and their defaults
    Fields {
        /// Block name (see `blocks`)
        block: String,
    },

    /// Build a phase policy table with defaults and profile overrides
    Build {
        /// Boot phase (pre-mem, post-mem); taken from the profile if omitted
        #[arg(short, long)]
        phase: Option<BootPhase>,

        /// Profile with field overrides (TOML, or RON for .ron files)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Registry capacity, e.g. "8 KiB" (default: exactly the phase's blocks)
        #[arg(long, value_parser = parse_capacity)]
        capacity: Option<u32>,

        /// Wrap the table in a handoff HOB list
        #[arg(long)]
        handoff: bool,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decode a policy table or handoff HOB list
    Dump {
        /// Table or HOB list file
        file: PathBuf,

        /// Also print each block's payload as hex
        #[arg(long)]
        hex: bool,
    },

    /// Check that a table carries every block of a phase in a usable revision
    Check {
        /// Table or HOB list file
        file: PathBuf,

        /// Phase to check against (default: detected from the file)
        #[arg(short, long)]
        phase: Option<BootPhase>,
    },
}
