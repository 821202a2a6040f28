//! Shard lifecycle errors

use thiserror::Error;

use super::routing::ShardId;
use super::state::ShardLifecycleState;

/// Result type for shard lifecycle operations
pub type ShardResult<T> = Result<T, ShardError>;

/// Errors raised by guarded shard transitions and operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardError {
    #[error("shard {0} closed")]
    Closed(ShardId),

    #[error("shard {shard} not started, current state [{state}]")]
    NotStarted {
        shard: ShardId,
        state: ShardLifecycleState,
    },

    #[error("shard {shard} in illegal state [{state}]: {reason}")]
    IllegalState {
        shard: ShardId,
        state: ShardLifecycleState,
        reason: String,
    },
}

impl ShardError {
    pub fn illegal_state(
        shard: &ShardId,
        state: ShardLifecycleState,
        reason: impl Into<String>,
    ) -> Self {
        Self::IllegalState {
            shard: shard.clone(),
            state,
            reason: reason.into(),
        }
    }

    /// Closed and not-started errors mean the shard went away under a
    /// running recovery.
    pub fn is_shard_gone(&self) -> bool {
        matches!(self, Self::Closed(_) | Self::NotStarted { .. })
    }
}
