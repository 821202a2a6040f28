//! Gateway recovery service
//!
//! Entry point for recovering one shard. `recover` evaluates eligibility on
//! the calling thread and, if the shard's `recovering` gate is acquired,
//! schedules the recovery body on the execution pool and returns at once.
//!
//! # Guarantees
//!
//! - Every `recover` call reports exactly one outcome to its listener
//! - At most one recovery body runs per shard; the shard's own gate decides
//! - No retries; a caller that wants one calls `recover` again

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use crate::gateway::{Gateway, SnapshotRestore};
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry};
use crate::pool::ExecutionPool;
use crate::shard::{LocalNode, RecoveringTransition, Shard, ShardId};

use super::errors::RecoveryError;
use super::executor::RecoveryExecutor;
use super::listener::RecoveryListener;
use super::outcome::{deliver, RecoveryOutcome, ALREADY_RECOVERING};
use super::source::RecoverySource;

/// Orchestrates one-time recovery of a shard
pub struct GatewayRecoveryService {
    shard: Arc<dyn Shard>,
    gateway: Arc<dyn Gateway>,
    snapshot_restore: Arc<dyn SnapshotRestore>,
    pool: Arc<dyn ExecutionPool>,
    local_node: LocalNode,
    metrics: Arc<MetricsRegistry>,
    /// Whether the gateway has been released
    closed: Mutex<bool>,
}

impl GatewayRecoveryService {
    pub fn new(
        shard: Arc<dyn Shard>,
        gateway: Arc<dyn Gateway>,
        snapshot_restore: Arc<dyn SnapshotRestore>,
        pool: Arc<dyn ExecutionPool>,
        local_node: LocalNode,
    ) -> Self {
        Self {
            shard,
            gateway,
            snapshot_restore,
            pool,
            local_node,
            metrics: Arc::new(MetricsRegistry::new()),
            closed: Mutex::new(false),
        }
    }

    /// Shares an existing metrics registry.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn shard_id(&self) -> &ShardId {
        self.shard.shard_id()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Hook for routing changes. Called after the new routing is set on the shard.
    pub fn routing_state_changed(&self) {}

    /// Recovers the shard from the gateway or from a snapshot.
    ///
    /// Never blocks on the recovery itself.
    pub fn recover<L: RecoveryListener>(&self, index_should_exist: bool, listener: L) {
        let shard_id = self.shard.shard_id();
        self.metrics.increment_requested();
        Logger::trace(
            Event::RecoveryRequested.as_str(),
            &[("shard", &shard_id.to_string())],
        );

        if self.shard.state().is_closed() {
            deliver(shard_id, &self.metrics, RecoveryOutcome::shard_closed(), listener);
            return;
        }

        let routing = self.shard.routing_entry();
        if !routing.primary {
            log_event_with_fields(
                Event::RecoveryRejected,
                &[("reason", "backup state"), ("shard", &shard_id.to_string())],
            );
            let error = RecoveryError::backup_state(shard_id);
            deliver(shard_id, &self.metrics, RecoveryOutcome::Failed(error), listener);
            return;
        }

        let source = RecoverySource::select(&routing);
        let state = match self.shard.recovering(
            source.reason(),
            source.recovery_type(),
            source.descriptor(&self.local_node),
        ) {
            RecoveringTransition::Acquired(state) => state,
            RecoveringTransition::AlreadyInProgress { state } => {
                let reason = format!(
                    "{}, shard {} is in state [{}]",
                    ALREADY_RECOVERING, shard_id, state
                );
                deliver(shard_id, &self.metrics, RecoveryOutcome::Ignored(reason), listener);
                return;
            }
            RecoveringTransition::Closed => {
                deliver(shard_id, &self.metrics, RecoveryOutcome::shard_closed(), listener);
                return;
            }
        };

        Logger::info(
            Event::RecoveryScheduled.as_str(),
            &[
                ("recovery_type", source.recovery_type().as_str()),
                ("shard", &shard_id.to_string()),
            ],
        );

        let executor = RecoveryExecutor {
            shard: Arc::clone(&self.shard),
            gateway: Arc::clone(&self.gateway),
            snapshot_restore: Arc::clone(&self.snapshot_restore),
            metrics: Arc::clone(&self.metrics),
            source,
            state,
            index_should_exist,
        };
        self.metrics.increment_scheduled();
        self.pool.submit(Box::new(move || executor.run(listener)));
    }

    /// Releases the gateway. Later calls are no-ops.
    pub fn close(&self) -> io::Result<()> {
        let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Ok(());
        }
        self.gateway.close()?;
        *closed = true;
        Logger::info(
            Event::GatewayClosed.as_str(),
            &[
                ("gateway", &self.gateway.to_string()),
                ("shard", &self.shard.shard_id().to_string()),
            ],
        );
        Ok(())
    }
}
