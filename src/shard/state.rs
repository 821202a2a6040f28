//! Shard lifecycle states
//!
//! The lifecycle moves strictly forward:
//!
//! ```text
//! NOT_STARTED -> RECOVERING -> POST_RECOVERY -> STARTED
//!                                                 |
//!                                              RELOCATED
//! ```
//!
//! `CLOSED` is reachable from every state and is terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a shard copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardLifecycleState {
    /// Created, holds no data yet.
    NotStarted,
    /// Populating on-disk state from a gateway or snapshot.
    Recovering,
    /// Data recovered, activation done, not yet marked started by the cluster.
    PostRecovery,
    /// Serving reads and writes.
    Started,
    /// Handed off to another node.
    Relocated,
    /// Removed or shut down. Terminal.
    Closed,
}

impl ShardLifecycleState {
    /// Returns the state name for observability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Recovering => "RECOVERING",
            Self::PostRecovery => "POST_RECOVERY",
            Self::Started => "STARTED",
            Self::Relocated => "RELOCATED",
            Self::Closed => "CLOSED",
        }
    }

    /// Whether activation after recovery already happened.
    pub fn is_activated(&self) -> bool {
        matches!(self, Self::PostRecovery | Self::Started)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ShardLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
