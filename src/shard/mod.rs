//! Shard collaborator for the recovery path
//!
//! The recovery service never mutates shard lifecycle directly. It goes
//! through the [`Shard`] trait, whose `recovering` transition is the
//! mutual-exclusion gate: only one caller can move a shard into
//! `RECOVERING`, every other caller is told why it lost.

mod errors;
mod index_shard;
mod routing;
mod state;

use std::sync::Arc;

pub use errors::{ShardError, ShardResult};
pub use index_shard::IndexShard;
pub use routing::{LocalNode, RestoreSource, RoutingAssignment, ShardId};
pub use state::ShardLifecycleState;

use crate::recovery::{RecoverySourceDescriptor, RecoveryState, RecoveryType};

/// Result of the guarded `recovering` transition.
#[derive(Debug, Clone)]
pub enum RecoveringTransition {
    /// The caller owns this recovery attempt.
    Acquired(Arc<RecoveryState>),
    /// The shard already left `NOT_STARTED`; another attempt owns it or finished.
    AlreadyInProgress { state: ShardLifecycleState },
    /// The shard is closed.
    Closed,
}

/// Shard operations the recovery path depends on.
///
/// Implementations must call [`RecoveryState::freeze`] on the state
/// handed out by [`Shard::recovering`] when the shard moves to `CLOSED`.
/// Stage changes after close are only rejected through that flag.
pub trait Shard: Send + Sync {
    fn shard_id(&self) -> &ShardId;

    /// Current lifecycle state.
    fn state(&self) -> ShardLifecycleState;

    /// Current routing entry.
    fn routing_entry(&self) -> RoutingAssignment;

    /// Atomically moves the shard into `RECOVERING` and creates the
    /// recovery state for the new attempt.
    fn recovering(
        &self,
        reason: &str,
        recovery_type: RecoveryType,
        source: RecoverySourceDescriptor,
    ) -> RecoveringTransition;

    /// Moves the shard from `RECOVERING` to `POST_RECOVERY`.
    fn post_recovery(&self, reason: &str) -> ShardResult<()>;

    /// Makes recovered data visible to readers.
    fn refresh(&self, reason: &str) -> ShardResult<()>;
}
