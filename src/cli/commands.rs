//! CLI command implementations
//!
//! `recover` boots a tokio runtime, wires the filesystem collaborators
//! into a [`GatewayRecoveryService`], triggers one recovery and waits for
//! its single outcome.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::gateway::LocalGateway;
use crate::observability::Logger;
use crate::pool::BlockingPool;
use crate::recovery::GatewayRecoveryService;
use crate::shard::{IndexShard, LocalNode, RestoreSource, RoutingAssignment, Shard, ShardId};
use crate::snapshot::LocalSnapshotRestore;

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{write_report, RecoveryReport};

/// Name restore sources use for the configured snapshot repository
pub const LOCAL_REPOSITORY: &str = "local";

const NODE_NAME: &str = "aeroshard";

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Recover {
            config,
            snapshot,
            no_index_required,
        } => recover(&config, snapshot, no_index_required),
    }
}

/// Recover the configured shard and print the report.
///
/// Fails with `AERO_CLI_RECOVERY_FAILED` after printing when the outcome
/// is `failed`.
pub fn recover(
    config_path: &Path,
    snapshot: Option<String>,
    no_index_required: bool,
) -> CliResult<()> {
    let mut config = Config::load(config_path)?;
    if snapshot.is_some() {
        config.restore_snapshot = snapshot;
    }
    if no_index_required {
        config.index_should_exist = false;
    }
    config.validate()?;
    Logger::set_min_severity(config.severity());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(config.max_blocking_threads)
        .enable_all()
        .build()
        .map_err(|e| CliError::io_error(format!("Failed to start runtime: {}", e)))?;

    let report = runtime.block_on(recover_shard(&config))?;
    write_report(&report)?;

    match report.outcome.error() {
        Some(error) => Err(CliError::recovery_failed(error.to_string())),
        None => Ok(()),
    }
}

/// Runs one recovery of the configured shard inside the current runtime.
pub async fn recover_shard(config: &Config) -> CliResult<RecoveryReport> {
    let shard_id = ShardId::new(&config.index, config.shard);
    let routing = RoutingAssignment {
        primary: config.primary,
        restore_source: config
            .restore_snapshot
            .as_ref()
            .map(|snapshot| RestoreSource::new(LOCAL_REPOSITORY, snapshot, &config.index)),
    };

    let shard = Arc::new(IndexShard::new(shard_id.clone(), routing));
    let gateway = Arc::new(LocalGateway::new(config.gateway_path(), config.data_path()));
    let snapshot_restore = Arc::new(LocalSnapshotRestore::new(
        LOCAL_REPOSITORY,
        config.snapshot_repository_path().unwrap_or_default(),
        config.data_path(),
    ));
    let pool = BlockingPool::current()
        .map_err(|e| CliError::io_error(format!("No runtime for blocking pool: {}", e)))?;

    let service = GatewayRecoveryService::new(
        shard.clone(),
        gateway,
        snapshot_restore,
        Arc::new(pool),
        LocalNode::new(NODE_NAME),
    );

    let (tx, rx) = oneshot::channel();
    service.recover(config.index_should_exist, tx);
    let outcome = rx
        .await
        .map_err(|_| CliError::recovery_failed("recovery ended without reporting an outcome"))?;

    service
        .close()
        .map_err(|e| CliError::io_error(format!("Failed to close gateway: {}", e)))?;

    Ok(RecoveryReport {
        shard_id,
        outcome,
        shard_state: shard.state(),
        recovery: shard.recovery_state().map(|state| state.snapshot()),
        metrics: service.metrics().snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::{RecoveryErrorCode, Stage};
    use crate::shard::ShardLifecycleState;
    use std::fs;
    use tempfile::TempDir;

    fn config(temp_dir: &TempDir) -> Config {
        serde_json::from_value(serde_json::json!({
            "data_dir": temp_dir.path().join("data"),
            "gateway_dir": temp_dir.path().join("gateway"),
            "snapshot_repository_dir": temp_dir.path().join("repo"),
            "index": "logs",
            "log_level": "error",
        }))
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recover_shard_from_gateway() {
        let temp_dir = TempDir::new().unwrap();
        let index = temp_dir.path().join("gateway/logs/0/index");
        fs::create_dir_all(&index).unwrap();
        fs::write(index.join("_0.cfs"), b"segment").unwrap();

        let report = recover_shard(&config(&temp_dir)).await.unwrap();
        assert!(report.outcome.is_done());
        assert_eq!(report.shard_state, ShardLifecycleState::PostRecovery);
        let recovery = report.recovery.unwrap();
        assert_eq!(recovery.stage, Stage::Done);
        assert_eq!(recovery.index.recovered_files, 1);
        assert_eq!(report.metrics.recoveries_completed, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recover_shard_missing_index_fails() {
        let temp_dir = TempDir::new().unwrap();

        let report = recover_shard(&config(&temp_dir)).await.unwrap();
        let error = report.outcome.error().unwrap();
        assert_eq!(error.code(), RecoveryErrorCode::AeroRecoveryIndexMissing);
        assert_eq!(report.recovery.unwrap().stage, Stage::Failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recover_shard_replica_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir);
        config.primary = false;

        let report = recover_shard(&config).await.unwrap();
        assert_eq!(
            report.outcome.error().unwrap().code(),
            RecoveryErrorCode::AeroRecoveryBackupState
        );
        assert_eq!(report.shard_state, ShardLifecycleState::NotStarted);
        assert!(report.recovery.is_none());
    }
}
