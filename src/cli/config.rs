//! Configuration file
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/aeroshard/data",
//!   "gateway_dir": "/var/lib/aeroshard/gateway",
//!   "snapshot_repository_dir": "/var/lib/aeroshard/snapshots",
//!   "index": "logs",
//!   "shard": 0
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::observability::Severity;

use super::errors::{CliError, CliResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the shard's files are placed (required)
    pub data_dir: String,

    /// Durable copy the gateway recovers from (required)
    pub gateway_dir: String,

    /// Local snapshot repository (required when restoring)
    #[serde(default)]
    pub snapshot_repository_dir: Option<String>,

    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default)]
    pub shard: u32,

    /// Whether this copy is the primary (default: true)
    #[serde(default = "default_true")]
    pub primary: bool,

    /// Snapshot to restore from instead of the gateway
    #[serde(default)]
    pub restore_snapshot: Option<String>,

    /// Fail if the gateway holds no index (default: true)
    #[serde(default = "default_true")]
    pub index_should_exist: bool,

    /// One of trace, info, warn, error, fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
}

fn default_index() -> String {
    "default".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_blocking_threads() -> usize {
    4
}

impl Config {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.data_dir.is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }
        if self.gateway_dir.is_empty() {
            return Err(CliError::config_error("gateway_dir must not be empty"));
        }
        if self.index.is_empty() {
            return Err(CliError::config_error("index must not be empty"));
        }
        if self.max_blocking_threads == 0 {
            return Err(CliError::config_error("max_blocking_threads must be > 0"));
        }
        if Severity::parse(&self.log_level).is_none() {
            return Err(CliError::config_error(format!(
                "Invalid log_level: '{}'. Expected one of trace, info, warn, error, fatal.",
                self.log_level
            )));
        }
        if self.restore_snapshot.is_some() && self.snapshot_repository_dir.is_none() {
            return Err(CliError::config_error(
                "snapshot_repository_dir is required when restoring a snapshot",
            ));
        }
        Ok(())
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn gateway_path(&self) -> PathBuf {
        PathBuf::from(&self.gateway_dir)
    }

    pub fn snapshot_repository_path(&self) -> Option<PathBuf> {
        self.snapshot_repository_dir.as_ref().map(PathBuf::from)
    }

    /// Minimum log severity. Falls back to INFO for an unvalidated level.
    pub fn severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }
}
