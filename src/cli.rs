//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Check-script registry and job runner.
#[derive(Parser, Debug)]
#[command(name = "checkrun", version, about)]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "checkrun.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List units present in the script folder but not yet registered.
    Discover,
    /// Register a unit and run it once, printing its findings.
    Run {
        /// Unit identifier (file base name).
        id: String,
    },
    /// Validate the configuration file.
    Validate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
