//! Recovery listener
//!
//! Every callback consumes the listener, so a listener can be told about
//! at most one outcome. The recovery service holds it by value until it
//! has an outcome to report.

use std::sync::mpsc;

use tokio::sync::oneshot;

use super::errors::RecoveryError;
use super::outcome::RecoveryOutcome;

/// Receives the single outcome of one `recover` call.
pub trait RecoveryListener: Send + 'static {
    fn on_recovery_done(self);

    fn on_ignore_recovery(self, reason: String);

    fn on_recovery_failed(self, error: RecoveryError);
}

/// Forwards the outcome to an async waiter. A dropped receiver is ignored.
impl RecoveryListener for oneshot::Sender<RecoveryOutcome> {
    fn on_recovery_done(self) {
        let _ = self.send(RecoveryOutcome::Done);
    }

    fn on_ignore_recovery(self, reason: String) {
        let _ = self.send(RecoveryOutcome::Ignored(reason));
    }

    fn on_recovery_failed(self, error: RecoveryError) {
        let _ = self.send(RecoveryOutcome::Failed(error));
    }
}

/// Forwards the outcome to a channel shared by several calls.
impl RecoveryListener for mpsc::Sender<RecoveryOutcome> {
    fn on_recovery_done(self) {
        let _ = self.send(RecoveryOutcome::Done);
    }

    fn on_ignore_recovery(self, reason: String) {
        let _ = self.send(RecoveryOutcome::Ignored(reason));
    }

    fn on_recovery_failed(self, error: RecoveryError) {
        let _ = self.send(RecoveryOutcome::Failed(error));
    }
}
