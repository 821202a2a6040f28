//! Observable events of the recovery path

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A recovery was requested for a shard
    RecoveryRequested,
    /// A recovery request was turned into an ignored outcome
    RecoveryIgnored,
    /// A recovery request was refused before scheduling
    RecoveryRejected,
    /// A recovery body was handed to the worker pool
    RecoveryScheduled,
    /// The worker started the recovery body
    RecoveryStart,
    /// Recovery finished and the shard was activated
    RecoveryComplete,
    /// Detailed per-phase breakdown of a completed recovery
    RecoverySummary,
    /// Recovery failed
    RecoveryFailed,
    /// Shard lifecycle state changed
    ShardStateChanged,
    /// Gateway resource released
    GatewayClosed,
}

impl Event {
    /// Returns the event name as logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RecoveryRequested => "RECOVERY_REQUESTED",
            Event::RecoveryIgnored => "RECOVERY_IGNORED",
            Event::RecoveryRejected => "RECOVERY_REJECTED",
            Event::RecoveryScheduled => "RECOVERY_SCHEDULED",
            Event::RecoveryStart => "RECOVERY_START",
            Event::RecoveryComplete => "RECOVERY_COMPLETE",
            Event::RecoverySummary => "RECOVERY_SUMMARY",
            Event::RecoveryFailed => "RECOVERY_FAILED",
            Event::ShardStateChanged => "SHARD_STATE_CHANGED",
            Event::GatewayClosed => "GATEWAY_CLOSED",
        }
    }

    /// Whether this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::RecoveryFailed | Event::RecoveryRejected)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
