//! Shard identity and routing assignment
//!
//! Routing is owned by the cluster layer. The recovery path only reads it.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one shard of one index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardId {
    /// Index name
    pub index: String,
    /// Shard number within the index
    pub shard: u32,
}

impl ShardId {
    pub fn new(index: impl Into<String>, shard: u32) -> Self {
        Self {
            index: index.into(),
            shard,
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.index, self.shard)
    }
}

/// Points at the snapshot a shard should be rebuilt from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSource {
    /// Repository name
    pub repository: String,
    /// Snapshot name within the repository
    pub snapshot: String,
    /// Index name as stored in the snapshot
    pub index: String,
}

impl RestoreSource {
    pub fn new(
        repository: impl Into<String>,
        snapshot: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            snapshot: snapshot.into(),
            index: index.into(),
        }
    }
}

impl fmt::Display for RestoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]/[{}]", self.repository, self.snapshot, self.index)
    }
}

/// The node performing a gateway recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalNode {
    pub id: Uuid,
    pub name: String,
}

impl LocalNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

impl fmt::Display for LocalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.name, self.id)
    }
}

/// Routing entry of a shard copy: its role and optional restore source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingAssignment {
    /// Whether this copy is the primary
    pub primary: bool,
    /// Snapshot to restore from, when the shard is being restored
    pub restore_source: Option<RestoreSource>,
}

impl RoutingAssignment {
    /// A primary copy recovering from the gateway.
    pub fn primary() -> Self {
        Self {
            primary: true,
            restore_source: None,
        }
    }

    /// A replica copy.
    pub fn replica() -> Self {
        Self {
            primary: false,
            restore_source: None,
        }
    }

    /// A primary copy restored from a snapshot.
    pub fn restoring(source: RestoreSource) -> Self {
        Self {
            primary: true,
            restore_source: Some(source),
        }
    }
}
