//! Transfer collaborators
//!
//! A [`Gateway`] repopulates a shard from this node's durable storage, a
//! [`SnapshotRestore`] rebuilds it from a snapshot. Both block the calling
//! worker, advance the recovery stage through INDEX, VERIFY_INDEX and
//! TRANSLOG, and fill in the counters of the [`RecoveryState`] they are given.

pub mod files;
mod local;
pub mod translog;

use std::fmt;
use std::io;
use std::path::Path;

use crate::recovery::{RecoveryError, RecoveryFailure, RecoveryState, Stage};
use crate::snapshot::checksum::{compute_file_checksum, format_checksum};

pub use local::LocalGateway;
pub use translog::{TranslogOperation, TranslogOperationKind, TranslogReader, TranslogWriter};

/// Durable storage a shard recovers from.
pub trait Gateway: fmt::Display + Send + Sync {
    /// Transfers the shard's persisted data into place.
    fn recover(&self, index_should_exist: bool, state: &RecoveryState) -> Result<(), RecoveryFailure>;

    /// Releases the gateway's resources.
    fn close(&self) -> io::Result<()>;
}

/// Restores a shard from the snapshot named by its recovery source.
pub trait SnapshotRestore: Send + Sync {
    fn restore(&self, state: &RecoveryState) -> Result<(), RecoveryFailure>;
}

/// Moves `state` to `stage`, failing with a shard-closed cause if the
/// shard closed underneath the transfer.
pub(crate) fn enter_stage(state: &RecoveryState, stage: Stage) -> Result<(), RecoveryError> {
    if state.advance(stage) {
        return Ok(());
    }
    ensure_open(state)?;
    Err(RecoveryError::failed(
        state.shard_id(),
        format!("cannot move recovery from [{}] to [{}]", state.stage(), stage),
    ))
}

pub(crate) fn ensure_open(state: &RecoveryState) -> Result<(), RecoveryError> {
    if state.is_frozen() {
        return Err(RecoveryError::shard_closed(
            state.shard_id(),
            format!("shard closed during recovery stage [{}]", state.stage()),
        ));
    }
    Ok(())
}

/// Places `source` at `target` unless an identical copy is already there,
/// and records the file in the index counters.
pub(crate) fn transfer_file(
    state: &RecoveryState,
    source: &Path,
    target: &Path,
    length: u64,
    checksum: u32,
) -> Result<(), RecoveryError> {
    let shard_id = state.shard_id();
    if files::is_reusable(target, length, checksum)
        .map_err(|e| RecoveryError::io_error_at_path(shard_id, target, e))?
    {
        state.index().add_reused_file(length);
        return Ok(());
    }
    files::copy_file_synced(source, target)
        .map_err(|e| RecoveryError::io_error_at_path(shard_id, target, e))?;
    state.index().add_recovered_file(length);
    Ok(())
}

/// Recomputes the checksum of every transferred file.
pub(crate) fn verify_files<'a>(
    state: &RecoveryState,
    expected: impl IntoIterator<Item = (&'a Path, u32)>,
) -> Result<(), RecoveryError> {
    let shard_id = state.shard_id();
    for (path, checksum) in expected {
        ensure_open(state)?;
        let actual = compute_file_checksum(path)
            .map_err(|e| RecoveryError::io_error_at_path(shard_id, path, e))?;
        if actual != checksum {
            return Err(RecoveryError::corruption(
                shard_id,
                format!(
                    "checksum mismatch for {}: expected {}, found {}",
                    path.display(),
                    format_checksum(checksum),
                    format_checksum(actual),
                ),
            ));
        }
    }
    Ok(())
}
