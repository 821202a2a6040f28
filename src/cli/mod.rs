//! CLI module for aeroshard
//!
//! Provides command-line interface for:
//! - recover: Recover one shard from its gateway or a snapshot

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{recover, recover_shard, run, run_command, LOCAL_REPOSITORY};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_json, write_report, RecoveryReport};
