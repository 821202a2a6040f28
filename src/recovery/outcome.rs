//! Recovery outcome and its classification
//!
//! Checks, in order:
//!
//! 1. Shard state is `CLOSED`                      -> Ignored("shard closed")
//! 2. Structured error caused by shard closed/not started -> Ignored("shard closed")
//! 3. Shard closed/not started raised directly     -> Ignored("shard closed")
//! 4. Any other structured error                   -> Failed(error)
//! 5. Anything else                                -> Failed("failed recovery", cause)
//!
//! Shard closure races with recovery from outside; it is never an error
//! for the caller.

use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::shard::{ShardId, ShardLifecycleState};

use super::errors::{RecoveryCause, RecoveryError, RecoveryFailure};
use super::listener::RecoveryListener;

/// Reason reported when the shard closed before or during recovery
pub const SHARD_CLOSED: &str = "shard closed";

/// Prefix of the reason reported when another attempt owns the shard
pub const ALREADY_RECOVERING: &str = "already in recovering process";

/// Result of one `recover` call
#[derive(Debug)]
pub enum RecoveryOutcome {
    Done,
    Ignored(String),
    Failed(RecoveryError),
}

impl RecoveryOutcome {
    pub fn shard_closed() -> Self {
        RecoveryOutcome::Ignored(SHARD_CLOSED.to_string())
    }

    pub fn is_done(&self) -> bool {
        matches!(self, RecoveryOutcome::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RecoveryOutcome::Failed(_))
    }

    pub fn ignored_reason(&self) -> Option<&str> {
        match self {
            RecoveryOutcome::Ignored(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RecoveryError> {
        match self {
            RecoveryOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            RecoveryOutcome::Done => "done",
            RecoveryOutcome::Ignored(_) => "ignored",
            RecoveryOutcome::Failed(_) => "failed",
        }
    }

    /// Invokes exactly one listener callback.
    pub fn notify<L: RecoveryListener>(self, listener: L) {
        match self {
            RecoveryOutcome::Done => listener.on_recovery_done(),
            RecoveryOutcome::Ignored(reason) => listener.on_ignore_recovery(reason),
            RecoveryOutcome::Failed(error) => listener.on_recovery_failed(error),
        }
    }
}

/// Maps a failure of the recovery body to an outcome.
///
/// `shard_state` is the shard's state observed when the failure was caught.
pub fn classify(
    shard_id: &ShardId,
    shard_state: ShardLifecycleState,
    failure: RecoveryFailure,
) -> RecoveryOutcome {
    if shard_state.is_closed() {
        return RecoveryOutcome::shard_closed();
    }

    match failure {
        RecoveryFailure::Recovery(error) if error.is_shard_gone() => {
            RecoveryOutcome::shard_closed()
        }
        RecoveryFailure::Recovery(error) => RecoveryOutcome::Failed(error),
        RecoveryFailure::Shard(error) if error.is_shard_gone() => RecoveryOutcome::shard_closed(),
        RecoveryFailure::Shard(error) => RecoveryOutcome::Failed(RecoveryError::failed_recovery(
            shard_id,
            RecoveryCause::Shard(error),
        )),
        RecoveryFailure::Unexpected(error) => RecoveryOutcome::Failed(
            RecoveryError::failed_recovery(shard_id, RecoveryCause::Other(error)),
        ),
    }
}

/// Records and logs an outcome, then hands it to the listener.
pub(crate) fn deliver<L: RecoveryListener>(
    shard_id: &ShardId,
    metrics: &MetricsRegistry,
    outcome: RecoveryOutcome,
    listener: L,
) {
    let shard = shard_id.to_string();
    match &outcome {
        RecoveryOutcome::Done => metrics.increment_completed(),
        RecoveryOutcome::Ignored(reason) => {
            metrics.increment_ignored();
            log_event_with_fields(
                Event::RecoveryIgnored,
                &[("reason", reason.as_str()), ("shard", &shard)],
            );
        }
        RecoveryOutcome::Failed(error) => {
            metrics.increment_failed();
            log_event_with_fields(
                Event::RecoveryFailed,
                &[
                    ("code", error.code().code()),
                    ("reason", &error.to_string()),
                    ("shard", &shard),
                ],
            );
        }
    }
    outcome.notify(listener);
}
