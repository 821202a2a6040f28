//! Recovery source selection
//!
//! A restore source on the routing entry means the shard is rebuilt from
//! a snapshot; otherwise it is recovered from the local gateway.

use crate::shard::{LocalNode, RestoreSource, RoutingAssignment};

use super::state::{RecoverySourceDescriptor, RecoveryType};

/// The path a recovery attempt takes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySource {
    Gateway,
    Snapshot(RestoreSource),
}

impl RecoverySource {
    /// Picks the path for a routing entry.
    pub fn select(routing: &RoutingAssignment) -> Self {
        match &routing.restore_source {
            Some(source) => RecoverySource::Snapshot(source.clone()),
            None => RecoverySource::Gateway,
        }
    }

    /// Type tag recorded on the recovery state
    pub fn recovery_type(&self) -> RecoveryType {
        match self {
            RecoverySource::Gateway => RecoveryType::Gateway,
            RecoverySource::Snapshot(_) => RecoveryType::Snapshot,
        }
    }

    /// Reason passed to the shard's `recovering` transition
    pub fn reason(&self) -> &'static str {
        match self {
            RecoverySource::Gateway => "from gateway",
            RecoverySource::Snapshot(_) => "from snapshot",
        }
    }

    /// Source recorded on the recovery state
    pub fn descriptor(&self, local_node: &LocalNode) -> RecoverySourceDescriptor {
        match self {
            RecoverySource::Gateway => RecoverySourceDescriptor::Node(local_node.clone()),
            RecoverySource::Snapshot(source) => RecoverySourceDescriptor::Snapshot(source.clone()),
        }
    }
}
