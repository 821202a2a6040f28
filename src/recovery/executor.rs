//! Recovery body, run on a pool worker
//!
//! Steps (in order):
//! 1. Start the attempt timer, stage INIT
//! 2. Transfer from the selected source (gateway or snapshot)
//! 3. Activate the shard unless something else already did
//! 4. Refresh so recovered data becomes visible
//! 5. Stage DONE, log the summary
//! 6. Report exactly one outcome
//!
//! Every failure, including a panic in a collaborator, ends in an outcome.
//! Nothing propagates back to the pool.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::gateway::{Gateway, SnapshotRestore};
use crate::observability::{
    format_bytes, format_millis, Event, Logger, MetricsRegistry,
};
use crate::shard::Shard;

use super::errors::{RecoveryCause, RecoveryError, RecoveryFailure};
use super::listener::RecoveryListener;
use super::outcome::{classify, deliver, RecoveryOutcome};
use super::source::RecoverySource;
use super::state::{now_millis, RecoveryState, Stage};

/// One scheduled recovery attempt
pub(crate) struct RecoveryExecutor {
    pub(crate) shard: Arc<dyn Shard>,
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) snapshot_restore: Arc<dyn SnapshotRestore>,
    pub(crate) metrics: Arc<MetricsRegistry>,
    pub(crate) source: RecoverySource,
    pub(crate) state: Arc<RecoveryState>,
    pub(crate) index_should_exist: bool,
}

impl RecoveryExecutor {
    /// Runs the attempt and reports its outcome to `listener`.
    pub(crate) fn run<L: RecoveryListener>(self, listener: L) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute()))
            .unwrap_or_else(|payload| Err(RecoveryFailure::unexpected(panic_message(payload))));

        let shard_id = self.state.shard_id();
        let outcome = match result {
            Ok(()) => RecoveryOutcome::Done,
            Err(failure) => match panic::catch_unwind(AssertUnwindSafe(|| self.shard.state())) {
                Ok(shard_state) => classify(shard_id, shard_state, failure),
                Err(payload) => RecoveryOutcome::Failed(RecoveryError::failed_recovery(
                    shard_id,
                    RecoveryCause::Other(
                        format!(
                            "{} (shard state unavailable: {})",
                            failure,
                            panic_message(payload)
                        )
                        .into(),
                    ),
                )),
            },
        };

        if outcome.is_failed() {
            self.state.advance(Stage::Failed);
        }
        deliver(shard_id, &self.metrics, outcome, listener);
    }

    fn execute(&self) -> Result<(), RecoveryFailure> {
        let shard_id = self.shard.shard_id().to_string();
        self.state.timer().start(now_millis());
        self.state.advance(Stage::Init);

        match &self.source {
            RecoverySource::Snapshot(restore_source) => {
                Logger::trace(
                    Event::RecoveryStart.as_str(),
                    &[("shard", &shard_id), ("source", &restore_source.to_string())],
                );
                self.snapshot_restore.restore(&self.state)?;
            }
            RecoverySource::Gateway => {
                Logger::trace(
                    Event::RecoveryStart.as_str(),
                    &[("shard", &shard_id), ("source", &self.gateway.to_string())],
                );
                self.gateway.recover(self.index_should_exist, &self.state)?;
            }
        }

        // The cluster may have activated and started the shard while the
        // transfer ran; activation must happen exactly once.
        if !self.shard.state().is_activated() {
            if let Err(e) = self.shard.post_recovery("post recovery from gateway") {
                // lost the race to an external activation
                if !self.shard.state().is_activated() {
                    return Err(e.into());
                }
            }
        }
        self.shard.refresh("post_gateway")?;

        self.state.timer().stop(now_millis());
        self.state.advance(Stage::Done);
        self.report_completion(&shard_id);
        Ok(())
    }

    fn report_completion(&self, shard_id: &str) {
        let index = self.state.index();
        self.metrics.add_transfer(
            index.recovered_files(),
            index.recovered_bytes(),
            index.reused_files(),
            index.reused_bytes(),
            self.state.translog().operations(),
        );

        let took = format_millis(self.state.timer().time());
        let source = self.source_name();

        Logger::trace(
            Event::RecoverySummary.as_str(),
            &[
                ("check_index", &format_millis(self.state.start().check_index_time())),
                ("index_files", &index.total_files().to_string()),
                ("index_size", &format_bytes(index.total_bytes())),
                ("index_took", &format_millis(index.timer().time())),
                ("recovered_files", &index.recovered_files().to_string()),
                ("recovered_size", &format_bytes(index.recovered_bytes())),
                ("reused_files", &index.reused_files().to_string()),
                ("reused_size", &format_bytes(index.reused_bytes())),
                ("shard", shard_id),
                ("source", &source),
                ("start_took", &format_millis(self.state.start().timer().time())),
                ("took", &took),
                ("translog_operations", &self.state.translog().operations().to_string()),
                ("translog_took", &format_millis(self.state.translog().timer().time())),
            ],
        );
        Logger::info(
            Event::RecoveryComplete.as_str(),
            &[("shard", shard_id), ("source", &source), ("took", &took)],
        );
    }

    fn source_name(&self) -> String {
        match &self.source {
            RecoverySource::Gateway => self.gateway.to_string(),
            RecoverySource::Snapshot(restore_source) => restore_source.to_string(),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("recovery body panicked: {}", detail)
}
