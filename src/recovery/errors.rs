//! Recovery error types
//!
//! Error codes:
//! - AERO_RECOVERY_FAILED
//! - AERO_RECOVERY_BACKUP_STATE
//! - AERO_RECOVERY_INDEX_MISSING
//! - AERO_RECOVERY_CORRUPTION
//! - AERO_RECOVERY_IO
//! - AERO_RECOVERY_SNAPSHOT
//!
//! Collaborators report failures as [`RecoveryFailure`], which separates
//! structured recovery errors, shard lifecycle errors raised directly, and
//! anything unexpected. The outcome classifier branches on that split.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::shard::{ShardError, ShardId};

/// Recovery-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryErrorCode {
    /// General recovery failure
    AeroRecoveryFailed,
    /// Recovery attempted on a non-primary copy
    AeroRecoveryBackupState,
    /// Index expected to exist but the source has none
    AeroRecoveryIndexMissing,
    /// Source data failed verification
    AeroRecoveryCorruption,
    /// I/O failure during transfer
    AeroRecoveryIo,
    /// Snapshot could not be read or restored
    AeroRecoverySnapshot,
}

impl RecoveryErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            RecoveryErrorCode::AeroRecoveryFailed => "AERO_RECOVERY_FAILED",
            RecoveryErrorCode::AeroRecoveryBackupState => "AERO_RECOVERY_BACKUP_STATE",
            RecoveryErrorCode::AeroRecoveryIndexMissing => "AERO_RECOVERY_INDEX_MISSING",
            RecoveryErrorCode::AeroRecoveryCorruption => "AERO_RECOVERY_CORRUPTION",
            RecoveryErrorCode::AeroRecoveryIo => "AERO_RECOVERY_IO",
            RecoveryErrorCode::AeroRecoverySnapshot => "AERO_RECOVERY_SNAPSHOT",
        }
    }
}

impl fmt::Display for RecoveryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Underlying cause of a [`RecoveryError`]
#[derive(Debug)]
pub enum RecoveryCause {
    /// The shard rejected an operation
    Shard(ShardError),
    /// I/O failure
    Io(io::Error),
    /// Anything else
    Other(Box<dyn Error + Send + Sync>),
}

impl RecoveryCause {
    /// Whether the cause is the shard being closed or not started.
    pub fn is_shard_gone(&self) -> bool {
        matches!(self, RecoveryCause::Shard(e) if e.is_shard_gone())
    }

    fn as_error(&self) -> &(dyn Error + 'static) {
        match self {
            RecoveryCause::Shard(e) => e,
            RecoveryCause::Io(e) => e,
            RecoveryCause::Other(e) => e.as_ref(),
        }
    }
}

impl fmt::Display for RecoveryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_error())
    }
}

/// Structured recovery error with shard context
#[derive(Debug)]
pub struct RecoveryError {
    code: RecoveryErrorCode,
    shard_id: ShardId,
    message: String,
    cause: Option<RecoveryCause>,
}

impl RecoveryError {
    /// Create an error with the given code and message
    pub fn new(code: RecoveryErrorCode, shard_id: &ShardId, message: impl Into<String>) -> Self {
        Self {
            code,
            shard_id: shard_id.clone(),
            message: message.into(),
            cause: None,
        }
    }

    /// Create a general recovery failed error
    pub fn failed(shard_id: &ShardId, message: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::AeroRecoveryFailed, shard_id, message)
    }

    /// Wrap an unexpected failure of the recovery body
    pub fn failed_recovery(shard_id: &ShardId, cause: RecoveryCause) -> Self {
        Self::failed(shard_id, "failed recovery").with_cause(cause)
    }

    /// Recovery requested on a replica copy
    pub fn backup_state(shard_id: &ShardId) -> Self {
        Self::new(
            RecoveryErrorCode::AeroRecoveryBackupState,
            shard_id,
            "Trying to recover when the shard is in backup state",
        )
    }

    /// Recovery stopped because the shard was closed underneath it
    pub fn shard_closed(shard_id: &ShardId, message: impl Into<String>) -> Self {
        Self::failed(shard_id, message)
            .with_cause(RecoveryCause::Shard(ShardError::Closed(shard_id.clone())))
    }

    /// Source holds no index although one was expected
    pub fn index_missing(shard_id: &ShardId, path: &Path) -> Self {
        Self::new(
            RecoveryErrorCode::AeroRecoveryIndexMissing,
            shard_id,
            format!("shard allocated for local recovery, but no index found at {}", path.display()),
        )
    }

    /// Source data failed verification
    pub fn corruption(shard_id: &ShardId, message: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::AeroRecoveryCorruption, shard_id, message)
    }

    /// I/O failure at a path
    pub fn io_error_at_path(shard_id: &ShardId, path: &Path, source: io::Error) -> Self {
        Self::new(
            RecoveryErrorCode::AeroRecoveryIo,
            shard_id,
            format!("I/O error at path: {}", path.display()),
        )
        .with_cause(RecoveryCause::Io(source))
    }

    /// Snapshot could not be read or restored
    pub fn snapshot(shard_id: &ShardId, message: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::AeroRecoverySnapshot, shard_id, message)
    }

    /// Attach an underlying cause
    pub fn with_cause(mut self, cause: RecoveryCause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn code(&self) -> RecoveryErrorCode {
        self.code
    }

    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&RecoveryCause> {
        self.cause.as_ref()
    }

    /// Whether the underlying cause is the shard closing or not being started
    pub fn is_shard_gone(&self) -> bool {
        self.cause.as_ref().is_some_and(RecoveryCause::is_shard_gone)
    }
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.shard_id, self.code, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {})", cause)?;
        }
        Ok(())
    }
}

impl Error for RecoveryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_ref().map(RecoveryCause::as_error)
    }
}

/// Result type for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// Failure raised by the recovery body or one of its collaborators
#[derive(Debug, Error)]
pub enum RecoveryFailure {
    /// Structured recovery error
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Shard lifecycle error raised directly
    #[error(transparent)]
    Shard(#[from] ShardError),

    /// Anything else, including panics in collaborators
    #[error("unexpected failure: {0}")]
    Unexpected(Box<dyn Error + Send + Sync>),
}

impl RecoveryFailure {
    pub fn unexpected(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        RecoveryFailure::Unexpected(error.into())
    }
}

impl From<io::Error> for RecoveryFailure {
    fn from(e: io::Error) -> Self {
        RecoveryFailure::Unexpected(Box::new(e))
    }
}
