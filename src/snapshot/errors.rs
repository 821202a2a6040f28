//! Snapshot restore errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::recovery::RecoveryError;
use crate::shard::ShardId;

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error at path: {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("snapshot file [{0}] listed in manifest is missing")]
    MissingFile(String),

    #[error("snapshot {0} not found")]
    MissingSnapshot(String),
}

impl SnapshotError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SnapshotError::Io {
            path: path.into(),
            source,
        }
    }

    /// Converts into a structured recovery error for `shard_id`.
    pub fn into_recovery_error(self, shard_id: &ShardId) -> RecoveryError {
        match self {
            SnapshotError::Io { path, source } => {
                RecoveryError::io_error_at_path(shard_id, &path, source)
            }
            other => RecoveryError::snapshot(shard_id, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryErrorCode;

    #[test]
    fn test_into_recovery_error_codes() {
        let shard = ShardId::new("idx", 0);

        let io = SnapshotError::io("/repo/x", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(
            io.into_recovery_error(&shard).code(),
            RecoveryErrorCode::AeroRecoveryIo
        );

        let missing = SnapshotError::MissingFile("_0.cfs".into());
        let err = missing.into_recovery_error(&shard);
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoverySnapshot);
        assert!(err.message().contains("_0.cfs"));

        let manifest = SnapshotError::Manifest("bad".into());
        assert_eq!(
            manifest.into_recovery_error(&shard).code(),
            RecoveryErrorCode::AeroRecoverySnapshot
        );
    }
}
