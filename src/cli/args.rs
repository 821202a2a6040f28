//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroshard recover --config <path> [--snapshot <name>] [--no-index-required]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aeroshard - recover a shard from its gateway or a snapshot
#[derive(Parser, Debug)]
#[command(name = "aeroshard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recover one shard and print the outcome as JSON
    Recover {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroshard.json")]
        config: PathBuf,

        /// Restore from this snapshot instead of the gateway
        #[arg(long)]
        snapshot: Option<String>,

        /// Treat a missing index as a new, empty shard
        #[arg(long)]
        no_index_required: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
