//! Recovery progress record
//!
//! One `RecoveryState` exists per recovery attempt. It is created by the
//! shard when the attempt acquires the `RECOVERING` gate, written only by
//! the worker running the attempt (and the transfer collaborator it calls),
//! and read concurrently by observers. Every field is atomic, so readers see
//! stale but monotonic values without locking.
//!
//! # Stage ordering
//!
//! ```text
//! INIT -> INDEX -> VERIFY_INDEX -> TRANSLOG -> FINALIZE -> DONE
//!   \________________________________________________/
//!                          |
//!                        FAILED
//! ```
//!
//! Stages only move forward. `DONE` and `FAILED` are terminal. Once the
//! shard is closed the state is frozen and no stage change is accepted.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::shard::{LocalNode, RestoreSource, ShardId};

/// Recovery stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init = 0,
    Index = 1,
    VerifyIndex = 2,
    Translog = 3,
    Finalize = 4,
    Done = 5,
    Failed = 6,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "INIT",
            Stage::Index => "INDEX",
            Stage::VerifyIndex => "VERIFY_INDEX",
            Stage::Translog => "TRANSLOG",
            Stage::Finalize => "FINALIZE",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Stage::Init,
            1 => Stage::Index,
            2 => Stage::VerifyIndex,
            3 => Stage::Translog,
            4 => Stage::Finalize,
            5 => Stage::Done,
            _ => Stage::Failed,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which path populated the shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryType {
    Gateway,
    Snapshot,
}

impl RecoveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryType::Gateway => "GATEWAY",
            RecoveryType::Snapshot => "SNAPSHOT",
        }
    }
}

/// Where the recovered data comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoverySourceDescriptor {
    /// Local gateway of this node
    Node(LocalNode),
    /// A snapshot in a repository
    Snapshot(RestoreSource),
}

impl fmt::Display for RecoverySourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoverySourceDescriptor::Node(node) => write!(f, "node {}", node),
            RecoverySourceDescriptor::Snapshot(source) => write!(f, "snapshot {}", source),
        }
    }
}

/// Set in the stage word once the owning shard has closed.
const FROZEN: u8 = 0x80;

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Start/stop wall clock of one phase. Zero means unset.
#[derive(Debug, Default)]
pub struct Timer {
    start_millis: AtomicI64,
    stop_millis: AtomicI64,
}

impl Timer {
    pub fn start(&self, millis: i64) {
        self.start_millis.store(millis, Ordering::Release);
        self.stop_millis.store(0, Ordering::Release);
    }

    pub fn stop(&self, millis: i64) {
        self.stop_millis.store(millis, Ordering::Release);
    }

    pub fn start_millis(&self) -> i64 {
        self.start_millis.load(Ordering::Acquire)
    }

    /// Elapsed milliseconds: until stop if stopped, until now if running.
    pub fn time(&self) -> u64 {
        let start = self.start_millis();
        if start == 0 {
            return 0;
        }
        let stop = match self.stop_millis.load(Ordering::Acquire) {
            0 => now_millis(),
            stop => stop,
        };
        stop.saturating_sub(start).max(0) as u64
    }
}

/// Index file counters
#[derive(Debug, Default)]
pub struct IndexProgress {
    timer: Timer,
    total_files: AtomicU64,
    recovered_files: AtomicU64,
    reused_files: AtomicU64,
    total_bytes: AtomicU64,
    recovered_bytes: AtomicU64,
    reused_bytes: AtomicU64,
}

impl IndexProgress {
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Records a file transferred from the source.
    pub fn add_recovered_file(&self, length: u64) {
        self.total_files.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(length, Ordering::Relaxed);
        self.recovered_files.fetch_add(1, Ordering::Relaxed);
        self.recovered_bytes.fetch_add(length, Ordering::Relaxed);
    }

    /// Records a file already present locally with identical content.
    pub fn add_reused_file(&self, length: u64) {
        self.total_files.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(length, Ordering::Relaxed);
        self.reused_files.fetch_add(1, Ordering::Relaxed);
        self.reused_bytes.fetch_add(length, Ordering::Relaxed);
    }

    pub fn total_files(&self) -> u64 {
        self.total_files.load(Ordering::Relaxed)
    }

    pub fn recovered_files(&self) -> u64 {
        self.recovered_files.load(Ordering::Relaxed)
    }

    pub fn reused_files(&self) -> u64 {
        self.reused_files.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    pub fn recovered_bytes(&self) -> u64 {
        self.recovered_bytes.load(Ordering::Relaxed)
    }

    pub fn reused_bytes(&self) -> u64 {
        self.reused_bytes.load(Ordering::Relaxed)
    }
}

/// Index verification timing
#[derive(Debug, Default)]
pub struct StartProgress {
    timer: Timer,
    check_index_millis: AtomicU64,
}

impl StartProgress {
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn set_check_index_time(&self, millis: u64) {
        self.check_index_millis.store(millis, Ordering::Relaxed);
    }

    pub fn check_index_time(&self) -> u64 {
        self.check_index_millis.load(Ordering::Relaxed)
    }
}

/// Translog replay counters
#[derive(Debug, Default)]
pub struct TranslogProgress {
    timer: Timer,
    operations: AtomicU64,
}

impl TranslogProgress {
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn increment_operations(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }
}

/// Progress of one recovery attempt
#[derive(Debug)]
pub struct RecoveryState {
    shard_id: ShardId,
    recovery_type: RecoveryType,
    source: RecoverySourceDescriptor,
    stage: AtomicU8,
    timer: Timer,
    index: IndexProgress,
    start: StartProgress,
    translog: TranslogProgress,
}

impl RecoveryState {
    pub fn new(
        shard_id: ShardId,
        recovery_type: RecoveryType,
        source: RecoverySourceDescriptor,
    ) -> Self {
        Self {
            shard_id,
            recovery_type,
            source,
            stage: AtomicU8::new(Stage::Init as u8),
            timer: Timer::default(),
            index: IndexProgress::default(),
            start: StartProgress::default(),
            translog: TranslogProgress::default(),
        }
    }

    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    pub fn recovery_type(&self) -> RecoveryType {
        self.recovery_type
    }

    pub fn source(&self) -> &RecoverySourceDescriptor {
        &self.source
    }

    pub fn stage(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Acquire) & !FROZEN)
    }

    /// Moves the stage to `next`.
    ///
    /// Returns false, leaving the stage unchanged, when `next` is behind
    /// the current stage, the current stage is terminal, or the state is
    /// frozen. Setting the current stage again is accepted.
    pub fn advance(&self, next: Stage) -> bool {
        self.stage
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                if word & FROZEN != 0 {
                    return None;
                }
                let current = Stage::from_u8(word);
                if current == next {
                    Some(next as u8)
                } else if current.is_terminal() {
                    None
                } else if next == Stage::Failed || next > current {
                    Some(next as u8)
                } else {
                    None
                }
            })
            .is_ok()
    }

    /// Stops all further stage changes. Called when the shard closes.
    pub fn freeze(&self) {
        self.stage.fetch_or(FROZEN, Ordering::AcqRel);
    }

    pub fn is_frozen(&self) -> bool {
        self.stage.load(Ordering::Acquire) & FROZEN != 0
    }

    /// Overall attempt timer
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn index(&self) -> &IndexProgress {
        &self.index
    }

    pub fn start(&self) -> &StartProgress {
        &self.start
    }

    pub fn translog(&self) -> &TranslogProgress {
        &self.translog
    }

    /// A serializable copy of the current values
    pub fn snapshot(&self) -> RecoveryStateSnapshot {
        RecoveryStateSnapshot {
            shard_id: self.shard_id.clone(),
            recovery_type: self.recovery_type,
            source: self.source.clone(),
            stage: self.stage(),
            start_time_millis: self.timer.start_millis(),
            took_millis: self.timer.time(),
            index: IndexSnapshot {
                total_files: self.index.total_files(),
                recovered_files: self.index.recovered_files(),
                reused_files: self.index.reused_files(),
                total_bytes: self.index.total_bytes(),
                recovered_bytes: self.index.recovered_bytes(),
                reused_bytes: self.index.reused_bytes(),
                took_millis: self.index.timer().time(),
            },
            start: StartSnapshot {
                took_millis: self.start.timer().time(),
                check_index_millis: self.start.check_index_time(),
            },
            translog: TranslogSnapshot {
                operations: self.translog.operations(),
                took_millis: self.translog.timer().time(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub total_files: u64,
    pub recovered_files: u64,
    pub reused_files: u64,
    pub total_bytes: u64,
    pub recovered_bytes: u64,
    pub reused_bytes: u64,
    pub took_millis: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSnapshot {
    pub took_millis: u64,
    pub check_index_millis: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslogSnapshot {
    pub operations: u64,
    pub took_millis: u64,
}

/// Point-in-time view of a [`RecoveryState`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStateSnapshot {
    pub shard_id: ShardId,
    pub recovery_type: RecoveryType,
    pub source: RecoverySourceDescriptor,
    pub stage: Stage,
    pub start_time_millis: i64,
    pub took_millis: u64,
    pub index: IndexSnapshot,
    pub start: StartSnapshot,
    pub translog: TranslogSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RecoveryState {
        RecoveryState::new(
            ShardId::new("idx", 0),
            RecoveryType::Gateway,
            RecoverySourceDescriptor::Node(LocalNode::new("node-1")),
        )
    }

    #[test]
    fn test_new_state_starts_at_init() {
        let state = state();
        assert_eq!(state.stage(), Stage::Init);
        assert_eq!(state.timer().time(), 0);
    }

    #[test]
    fn test_stage_only_moves_forward() {
        let state = state();
        assert!(state.advance(Stage::Index));
        assert!(state.advance(Stage::Translog));
        assert!(!state.advance(Stage::VerifyIndex));
        assert_eq!(state.stage(), Stage::Translog);

        // re-setting the current stage is accepted
        assert!(state.advance(Stage::Translog));
    }

    #[test]
    fn test_terminal_stages() {
        let done = state();
        assert!(done.advance(Stage::Done));
        assert!(!done.advance(Stage::Failed));
        assert_eq!(done.stage(), Stage::Done);

        let failed = state();
        assert!(failed.advance(Stage::Index));
        assert!(failed.advance(Stage::Failed));
        assert!(!failed.advance(Stage::Done));
        assert_eq!(failed.stage(), Stage::Failed);
    }

    #[test]
    fn test_frozen_state_rejects_advances() {
        let state = state();
        state.freeze();
        assert!(!state.advance(Stage::Index));
        assert!(!state.advance(Stage::Failed));
        assert_eq!(state.stage(), Stage::Init);
    }

    #[test]
    fn test_index_counters() {
        let state = state();
        state.index().add_recovered_file(100);
        state.index().add_recovered_file(50);
        state.index().add_reused_file(25);

        assert_eq!(state.index().total_files(), 3);
        assert_eq!(state.index().recovered_files(), 2);
        assert_eq!(state.index().reused_files(), 1);
        assert_eq!(state.index().total_bytes(), 175);
        assert_eq!(state.index().recovered_bytes(), 150);
        assert_eq!(state.index().reused_bytes(), 25);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::default();
        timer.start(1_000);
        timer.stop(1_250);
        assert_eq!(timer.time(), 250);
    }

    #[test]
    fn test_snapshot_serializes() {
        let state = state();
        state.advance(Stage::Index);
        state.translog().increment_operations();

        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["stage"], "INDEX");
        assert_eq!(json["recovery_type"], "GATEWAY");
        assert_eq!(json["source"]["kind"], "node");
        assert_eq!(json["translog"]["operations"], 1);
    }
}
