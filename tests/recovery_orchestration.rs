//! Recovery Orchestration Tests
//!
//! Drives `GatewayRecoveryService` against scripted collaborators and an
//! in-process shard. A `ManualPool` holds scheduled bodies so each test can
//! observe the state between `recover` returning and the body running.
//!
//! Covered:
//! - Eligibility (closed shard, replica copy, concurrent triggers)
//! - Source selection (gateway vs snapshot)
//! - Activation (post recovery once, skipped after external start)
//! - Outcome classification (shard closed, structured, unexpected, panic)
//! - Exactly one listener callback per call

use std::error::Error;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;

use aeroshard::gateway::{Gateway, SnapshotRestore};
use aeroshard::pool::{BlockingPool, ManualPool};
use aeroshard::recovery::{
    GatewayRecoveryService, RecoveryError, RecoveryErrorCode, RecoveryFailure, RecoveryListener,
    RecoveryOutcome, RecoverySourceDescriptor, RecoveryState, RecoveryType, Stage,
    ALREADY_RECOVERING, SHARD_CLOSED,
};
use aeroshard::shard::{
    IndexShard, LocalNode, RecoveringTransition, RestoreSource, RoutingAssignment, Shard,
    ShardError, ShardId, ShardLifecycleState, ShardResult,
};

// =============================================================================
// Test Utilities
// =============================================================================

type Action = Box<dyn Fn(&RecoveryState) -> Result<(), RecoveryFailure> + Send + Sync>;

/// Runs the full stage sequence and records a little progress.
fn transfer(state: &RecoveryState) -> Result<(), RecoveryFailure> {
    state.advance(Stage::Index);
    state.index().add_recovered_file(10);
    state.index().add_reused_file(5);
    state.advance(Stage::VerifyIndex);
    state.advance(Stage::Translog);
    state.translog().increment_operations();
    state.advance(Stage::Finalize);
    Ok(())
}

/// Gateway or snapshot restore whose behaviour is a closure
struct Scripted {
    calls: AtomicUsize,
    action: Action,
}

impl Scripted {
    fn ok() -> Arc<Self> {
        Self::with(transfer)
    }

    fn with<F>(action: F) -> Arc<Self>
    where
        F: Fn(&RecoveryState) -> Result<(), RecoveryFailure> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            action: Box::new(action),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn run(&self, state: &RecoveryState) -> Result<(), RecoveryFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.action)(state)
    }
}

impl fmt::Display for Scripted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scripted")
    }
}

impl Gateway for Scripted {
    fn recover(&self, _index_should_exist: bool, state: &RecoveryState) -> Result<(), RecoveryFailure> {
        self.run(state)
    }

    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

impl SnapshotRestore for Scripted {
    fn restore(&self, state: &RecoveryState) -> Result<(), RecoveryFailure> {
        self.run(state)
    }
}

/// Step of the recovery body at which `FlakyShard` fails
#[derive(Debug, Clone, Copy, PartialEq)]
enum Fault {
    PostRecoveryError,
    RefreshError,
    RefreshPanic,
    /// Refresh fails, then reading the lifecycle state panics
    StateUnreadable,
}

/// An `IndexShard` that fails one step on demand
struct FlakyShard {
    inner: IndexShard,
    fault: Fault,
    state_broken: AtomicBool,
}

impl FlakyShard {
    fn new(fault: Fault) -> Self {
        Self {
            inner: IndexShard::new(shard_id(), RoutingAssignment::primary()),
            fault,
            state_broken: AtomicBool::new(false),
        }
    }
}

impl Shard for FlakyShard {
    fn shard_id(&self) -> &ShardId {
        self.inner.shard_id()
    }

    fn state(&self) -> ShardLifecycleState {
        if self.state_broken.load(Ordering::SeqCst) {
            panic!("lifecycle state unreadable");
        }
        self.inner.state()
    }

    fn routing_entry(&self) -> RoutingAssignment {
        self.inner.routing_entry()
    }

    fn recovering(
        &self,
        reason: &str,
        recovery_type: RecoveryType,
        source: RecoverySourceDescriptor,
    ) -> RecoveringTransition {
        self.inner.recovering(reason, recovery_type, source)
    }

    fn post_recovery(&self, reason: &str) -> ShardResult<()> {
        if self.fault == Fault::PostRecoveryError {
            return Err(ShardError::illegal_state(
                self.shard_id(),
                self.state(),
                "activation rejected",
            ));
        }
        self.inner.post_recovery(reason)
    }

    fn refresh(&self, reason: &str) -> ShardResult<()> {
        match self.fault {
            Fault::RefreshError => Err(ShardError::illegal_state(
                self.shard_id(),
                self.state(),
                "searcher unavailable",
            )),
            Fault::RefreshPanic => panic!("refresh exploded"),
            Fault::StateUnreadable => {
                let error = ShardError::illegal_state(
                    self.shard_id(),
                    self.inner.state(),
                    "searcher unavailable",
                );
                self.state_broken.store(true, Ordering::SeqCst);
                Err(error)
            }
            Fault::PostRecoveryError => self.inner.refresh(reason),
        }
    }
}

struct Harness {
    service: GatewayRecoveryService,
    pool: Arc<ManualPool>,
}

fn shard_id() -> ShardId {
    ShardId::new("logs", 0)
}

fn index_shard(routing: RoutingAssignment) -> Arc<IndexShard> {
    Arc::new(IndexShard::new(shard_id(), routing))
}

fn harness(shard: Arc<dyn Shard>, gateway: Arc<Scripted>, restore: Arc<Scripted>) -> Harness {
    let pool = Arc::new(ManualPool::new());
    let service = GatewayRecoveryService::new(
        shard,
        gateway,
        restore,
        pool.clone(),
        LocalNode::new("node-1"),
    );
    Harness { service, pool }
}

/// Every outcome delivered on `rx` so far
fn drain(rx: &mpsc::Receiver<RecoveryOutcome>) -> Vec<RecoveryOutcome> {
    rx.try_iter().collect()
}

fn single(rx: &mpsc::Receiver<RecoveryOutcome>) -> RecoveryOutcome {
    let mut outcomes = drain(rx);
    assert_eq!(outcomes.len(), 1, "expected exactly one outcome, got {:?}", outcomes);
    outcomes.remove(0)
}

/// Listener that records the shard's activation count at callback time
struct ProbeListener {
    shard: Arc<IndexShard>,
    seen: mpsc::Sender<(&'static str, u64, u64)>,
}

impl ProbeListener {
    fn record(self, status: &'static str) {
        let _ = self.seen.send((
            status,
            self.shard.post_recovery_count(),
            self.shard.refresh_count(),
        ));
    }
}

impl RecoveryListener for ProbeListener {
    fn on_recovery_done(self) {
        self.record("done");
    }

    fn on_ignore_recovery(self, _reason: String) {
        self.record("ignored");
    }

    fn on_recovery_failed(self, _error: RecoveryError) {
        self.record("failed");
    }
}

// =============================================================================
// Eligibility
// =============================================================================

#[test]
fn test_closed_shard_is_ignored_synchronously() {
    let shard = index_shard(RoutingAssignment::primary());
    shard.close("removed");
    let gateway = Scripted::ok();
    let h = harness(shard.clone(), gateway.clone(), Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);

    // delivered before any pool task ran
    assert_eq!(single(&rx).ignored_reason(), Some(SHARD_CLOSED));
    assert_eq!(h.pool.pending(), 0);
    assert_eq!(gateway.calls(), 0);
    assert!(shard.recovery_state().is_none());
}

#[test]
fn test_replica_fails_with_backup_state() {
    let shard = index_shard(RoutingAssignment::replica());
    let gateway = Scripted::ok();
    let h = harness(shard.clone(), gateway.clone(), Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);

    let outcome = single(&rx);
    let error = outcome.error().unwrap();
    assert_eq!(error.code(), RecoveryErrorCode::AeroRecoveryBackupState);
    assert!(error.message().contains("backup state"));
    assert_eq!(h.pool.pending(), 0);
    assert_eq!(shard.state(), ShardLifecycleState::NotStarted);
}

#[test]
fn test_extra_calls_while_in_flight_are_ignored() {
    let shard = index_shard(RoutingAssignment::primary());
    let gateway = Scripted::ok();
    let h = harness(shard.clone(), gateway.clone(), Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx.clone());
    assert!(drain(&rx).is_empty());

    for _ in 0..3 {
        h.service.recover(true, tx.clone());
    }
    let ignored = drain(&rx);
    assert_eq!(ignored.len(), 3);
    for outcome in &ignored {
        let reason = outcome.ignored_reason().unwrap();
        assert!(reason.starts_with(ALREADY_RECOVERING), "{}", reason);
        assert!(reason.contains("[RECOVERING]"));
    }

    // the in-flight attempt is untouched
    assert_eq!(h.pool.pending(), 1);
    assert_eq!(h.pool.run_all(), 1);
    assert!(single(&rx).is_done());
    assert_eq!(gateway.calls(), 1);
    assert_eq!(h.service.metrics().snapshot().recoveries_ignored, 3);
}

#[test]
fn test_recover_after_completion_is_ignored() {
    let shard = index_shard(RoutingAssignment::primary());
    let h = harness(shard.clone(), Scripted::ok(), Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx.clone());
    h.pool.run_all();
    assert!(single(&rx).is_done());

    h.service.recover(true, tx);
    let reason = single(&rx).ignored_reason().unwrap().to_string();
    assert!(reason.contains("[POST_RECOVERY]"));
    assert_eq!(h.pool.pending(), 0);
}

// =============================================================================
// Source selection
// =============================================================================

#[test]
fn test_gateway_used_without_restore_source() {
    let shard = index_shard(RoutingAssignment::primary());
    let gateway = Scripted::ok();
    let restore = Scripted::ok();
    let h = harness(shard.clone(), gateway.clone(), restore.clone());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    assert!(single(&rx).is_done());
    assert_eq!(gateway.calls(), 1);
    assert_eq!(restore.calls(), 0);

    let state = shard.recovery_state().unwrap();
    assert_eq!(state.recovery_type(), RecoveryType::Gateway);
    assert!(matches!(state.source(), RecoverySourceDescriptor::Node(node) if node.name == "node-1"));
}

#[test]
fn test_snapshot_restore_used_with_restore_source() {
    let source = RestoreSource::new("local", "nightly", "logs");
    let shard = index_shard(RoutingAssignment::restoring(source.clone()));
    let gateway = Scripted::ok();
    let restore = Scripted::ok();
    let h = harness(shard.clone(), gateway.clone(), restore.clone());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    assert!(single(&rx).is_done());
    assert_eq!(gateway.calls(), 0);
    assert_eq!(restore.calls(), 1);

    let state = shard.recovery_state().unwrap();
    assert_eq!(state.recovery_type(), RecoveryType::Snapshot);
    assert_eq!(state.source(), &RecoverySourceDescriptor::Snapshot(source));
}

// =============================================================================
// Activation
// =============================================================================

#[test]
fn test_post_recovery_runs_once_before_done() {
    let shard = index_shard(RoutingAssignment::primary());
    let h = harness(shard.clone(), Scripted::ok(), Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(
        true,
        ProbeListener {
            shard: shard.clone(),
            seen: tx,
        },
    );
    h.pool.run_all();

    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![("done", 1, 1)]);
    assert_eq!(shard.state(), ShardLifecycleState::PostRecovery);

    let state = shard.recovery_state().unwrap();
    assert_eq!(state.stage(), Stage::Done);
    assert!(state.timer().start_millis() > 0);
    assert_eq!(state.index().total_files(), 2);
    assert_eq!(state.translog().operations(), 1);

    let metrics = h.service.metrics().snapshot();
    assert_eq!(metrics.recoveries_completed, 1);
    assert_eq!(metrics.files_recovered, 1);
    assert_eq!(metrics.bytes_reused, 5);
}

#[test]
fn test_external_start_skips_post_recovery() {
    let shard = index_shard(RoutingAssignment::primary());
    let external = shard.clone();
    let gateway = Scripted::with(move |state| {
        transfer(state)?;
        // cluster state update activates the shard mid-flight
        external.post_recovery("cluster state")?;
        external.start("cluster state")?;
        Ok(())
    });
    let h = harness(shard.clone(), gateway, Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    assert!(single(&rx).is_done());
    assert_eq!(shard.post_recovery_count(), 1);
    assert_eq!(shard.refresh_count(), 1);
    assert_eq!(shard.state(), ShardLifecycleState::Started);
}

// =============================================================================
// Outcome classification
// =============================================================================

#[test]
fn test_wrapped_shard_closed_is_ignored() {
    let shard = index_shard(RoutingAssignment::primary());
    let gateway = Scripted::with(|state| {
        Err(RecoveryError::shard_closed(state.shard_id(), "interrupted while copying").into())
    });
    let h = harness(shard.clone(), gateway, Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    assert_eq!(single(&rx).ignored_reason(), Some(SHARD_CLOSED));
    assert_eq!(shard.post_recovery_count(), 0);
}

#[test]
fn test_unstructured_error_is_failed_with_cause() {
    let shard = index_shard(RoutingAssignment::primary());
    let gateway = Scripted::with(|_| {
        Err(io::Error::new(io::ErrorKind::Other, "disk vanished").into())
    });
    let h = harness(shard.clone(), gateway, Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    let outcome = single(&rx);
    let error = outcome.error().unwrap();
    assert_eq!(error.code(), RecoveryErrorCode::AeroRecoveryFailed);
    assert_eq!(error.message(), "failed recovery");
    assert_eq!(error.source().unwrap().to_string(), "disk vanished");
    assert_eq!(shard.recovery_state().unwrap().stage(), Stage::Failed);
}

#[test]
fn test_structured_error_is_preserved() {
    let shard = index_shard(RoutingAssignment::primary());
    let gateway = Scripted::with(|state| {
        state.advance(Stage::Index);
        Err(RecoveryError::corruption(state.shard_id(), "checksum mismatch for _0.cfs").into())
    });
    let h = harness(shard.clone(), gateway, Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    let outcome = single(&rx);
    let error = outcome.error().unwrap();
    assert_eq!(error.code(), RecoveryErrorCode::AeroRecoveryCorruption);
    assert_eq!(error.message(), "checksum mismatch for _0.cfs");
    assert_eq!(h.service.metrics().snapshot().recoveries_failed, 1);
}

#[test]
fn test_close_mid_flight_is_ignored_and_freezes_stage() {
    let shard = index_shard(RoutingAssignment::primary());
    let closer = shard.clone();
    let gateway = Scripted::with(move |state| {
        state.advance(Stage::Index);
        closer.close("index deleted");
        assert!(!state.advance(Stage::Translog));
        Err(RecoveryFailure::unexpected("stream reset"))
    });
    let h = harness(shard.clone(), gateway, Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    assert_eq!(single(&rx).ignored_reason(), Some(SHARD_CLOSED));
    let state = shard.recovery_state().unwrap();
    assert_eq!(state.stage(), Stage::Index);
    assert!(state.is_frozen());
}

#[test]
fn test_close_after_transfer_is_ignored() {
    let shard = index_shard(RoutingAssignment::primary());
    let closer = shard.clone();
    let gateway = Scripted::with(move |state| {
        transfer(state)?;
        closer.close("index deleted");
        Ok(())
    });
    let h = harness(shard.clone(), gateway, Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    // post recovery hits the closed shard
    assert_eq!(single(&rx).ignored_reason(), Some(SHARD_CLOSED));
    assert_eq!(shard.post_recovery_count(), 0);
    assert_ne!(shard.recovery_state().unwrap().stage(), Stage::Done);
}

#[test]
fn test_panicking_gateway_fails_once() {
    let shard = index_shard(RoutingAssignment::primary());
    let gateway = Scripted::with(|_| panic!("gateway bug"));
    let h = harness(shard.clone(), gateway, Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    let outcome = single(&rx);
    let error = outcome.error().unwrap();
    assert_eq!(error.message(), "failed recovery");
    assert!(error.to_string().contains("gateway bug"));
}

#[test]
fn test_fault_at_every_shard_step_reports_once() {
    for fault in [
        Fault::PostRecoveryError,
        Fault::RefreshError,
        Fault::RefreshPanic,
        Fault::StateUnreadable,
    ] {
        let shard = Arc::new(FlakyShard::new(fault));
        let h = harness(shard.clone(), Scripted::ok(), Scripted::ok());
        let (tx, rx) = mpsc::channel();

        h.service.recover(true, tx);
        h.pool.run_all();

        let outcome = single(&rx);
        assert!(outcome.is_failed(), "{:?}: {:?}", fault, outcome);
        assert_eq!(
            shard.inner.recovery_state().unwrap().stage(),
            Stage::Failed,
            "{:?}",
            fault
        );
    }
}

#[test]
fn test_unreadable_shard_state_after_failure_still_reports() {
    let shard = Arc::new(FlakyShard::new(Fault::StateUnreadable));
    let h = harness(shard.clone(), Scripted::ok(), Scripted::ok());
    let (tx, rx) = mpsc::channel();

    h.service.recover(true, tx);
    h.pool.run_all();

    let outcome = single(&rx);
    let error = outcome.error().unwrap();
    assert_eq!(error.message(), "failed recovery");
    let display = error.to_string();
    assert!(display.contains("searcher unavailable"), "{}", display);
    assert!(display.contains("lifecycle state unreadable"), "{}", display);
    assert_eq!(h.service.metrics().snapshot().recoveries_failed, 1);
}

// =============================================================================
// Exactly once under concurrency
// =============================================================================

#[test]
fn test_concurrent_triggers_run_one_body() {
    const CALLERS: usize = 8;

    let shard = index_shard(RoutingAssignment::primary());
    let gateway = Scripted::ok();
    let h = Arc::new(harness(shard.clone(), gateway.clone(), Scripted::ok()));
    let (tx, rx) = mpsc::channel();
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let h = Arc::clone(&h);
            let tx = tx.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                h.service.recover(true, tx);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(h.pool.pending(), 1);
    h.pool.run_all();

    let outcomes = drain(&rx);
    assert_eq!(outcomes.len(), CALLERS);
    assert_eq!(outcomes.iter().filter(|o| o.is_done()).count(), 1);
    assert_eq!(
        outcomes.iter().filter(|o| o.ignored_reason().is_some()).count(),
        CALLERS - 1
    );
    assert_eq!(gateway.calls(), 1);
    assert_eq!(shard.post_recovery_count(), 1);

    let metrics = h.service.metrics().snapshot();
    assert_eq!(metrics.recoveries_requested, CALLERS as u64);
    assert_eq!(metrics.outcomes(), CALLERS as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_pool_delivers_outcome() {
    let shard = index_shard(RoutingAssignment::primary());
    let service = GatewayRecoveryService::new(
        shard.clone(),
        Scripted::ok(),
        Scripted::ok(),
        Arc::new(BlockingPool::current().unwrap()),
        LocalNode::new("node-1"),
    );
    let (tx, rx) = tokio::sync::oneshot::channel();

    service.recover(true, tx);

    assert!(rx.await.unwrap().is_done());
    assert_eq!(shard.state(), ShardLifecycleState::PostRecovery);
    service.close().unwrap();
}
