//! Restore a shard from a snapshot in a local repository
//!
//! Repository layout:
//!
//! ```text
//! <repository_dir>/<snapshot>/<index>/<shard>/manifest.json
//! <repository_dir>/<snapshot>/<index>/<shard>/<files listed in the manifest>
//! ```
//!
//! Files land in `<data_dir>/<index>/<shard>/index` under the name of the
//! shard being recovered, which may differ from the snapshot's index name.
//! Snapshots carry no translog.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use crate::gateway::files::{shard_path, INDEX_DIR};
use crate::gateway::{enter_stage, ensure_open, transfer_file, verify_files, SnapshotRestore};
use crate::recovery::{
    now_millis, RecoveryError, RecoveryFailure, RecoverySourceDescriptor, RecoveryState, Stage,
};
use crate::shard::RestoreSource;

use super::checksum::parse_checksum;
use super::errors::{SnapshotError, SnapshotResult};
use super::manifest::{SnapshotManifest, MANIFEST_FILE};

pub struct LocalSnapshotRestore {
    repository: String,
    repository_dir: PathBuf,
    data_dir: PathBuf,
}

impl LocalSnapshotRestore {
    /// `repository` is the name restore sources must carry to be served here.
    pub fn new(
        repository: impl Into<String>,
        repository_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository: repository.into(),
            repository_dir: repository_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Directory holding one shard of a snapshot
    pub fn snapshot_shard_dir(&self, source: &RestoreSource, shard: u32) -> PathBuf {
        self.repository_dir
            .join(&source.snapshot)
            .join(&source.index)
            .join(shard.to_string())
    }

    fn load_manifest(&self, source: &RestoreSource, shard: u32) -> SnapshotResult<(PathBuf, SnapshotManifest)> {
        if source.repository != self.repository {
            return Err(SnapshotError::Manifest(format!(
                "unknown repository [{}], expected [{}]",
                source.repository, self.repository
            )));
        }
        let dir = self.snapshot_shard_dir(source, shard);
        let manifest = match SnapshotManifest::read_from_file(&dir.join(MANIFEST_FILE)) {
            Err(SnapshotError::Io { source: e, .. }) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SnapshotError::MissingSnapshot(format!("{}[{}]", source, shard)))
            }
            other => other?,
        };
        if manifest.snapshot != source.snapshot || manifest.index != source.index || manifest.shard != shard {
            return Err(SnapshotError::Manifest(format!(
                "manifest describes [{}:{}][{}], expected {}[{}]",
                manifest.snapshot, manifest.index, manifest.shard, source, shard
            )));
        }
        for file in &manifest.files {
            if !is_plain_file_name(&file.name) {
                return Err(SnapshotError::Manifest(format!(
                    "file name [{}] is not a plain file name",
                    file.name
                )));
            }
        }
        Ok((dir, manifest))
    }

    fn restore_files(
        &self,
        state: &RecoveryState,
        snapshot_dir: &Path,
        manifest: &SnapshotManifest,
    ) -> Result<Vec<(PathBuf, u32)>, RecoveryError> {
        let shard_id = state.shard_id();
        let target_dir = shard_path(&self.data_dir, shard_id).join(INDEX_DIR);
        fs::create_dir_all(&target_dir)
            .map_err(|e| RecoveryError::io_error_at_path(shard_id, &target_dir, e))?;

        let mut transferred = Vec::with_capacity(manifest.files.len());
        for file in &manifest.files {
            ensure_open(state)?;
            let checksum = parse_checksum(&file.checksum).ok_or_else(|| {
                SnapshotError::Manifest(format!(
                    "invalid checksum [{}] for [{}]",
                    file.checksum, file.name
                ))
                .into_recovery_error(shard_id)
            })?;

            let source = snapshot_dir.join(&file.name);
            let length = match fs::metadata(&source) {
                Ok(metadata) => metadata.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(SnapshotError::MissingFile(file.name.clone()).into_recovery_error(shard_id))
                }
                Err(e) => return Err(RecoveryError::io_error_at_path(shard_id, &source, e)),
            };
            if length != file.length {
                return Err(RecoveryError::corruption(
                    shard_id,
                    format!(
                        "snapshot file [{}] has length {}, manifest records {}",
                        file.name, length, file.length
                    ),
                ));
            }

            let target = target_dir.join(&file.name);
            transfer_file(state, &source, &target, file.length, checksum)?;
            transferred.push((target, checksum));
        }
        Ok(transferred)
    }
}

/// Manifest entries must name a file directly inside the snapshot directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl SnapshotRestore for LocalSnapshotRestore {
    fn restore(&self, state: &RecoveryState) -> Result<(), RecoveryFailure> {
        let shard_id = state.shard_id();
        let source = match state.source() {
            RecoverySourceDescriptor::Snapshot(source) => source,
            other => {
                return Err(RecoveryError::snapshot(
                    shard_id,
                    format!("cannot restore from {}", other),
                )
                .into())
            }
        };

        enter_stage(state, Stage::Index)?;
        state.index().timer().start(now_millis());
        let (snapshot_dir, manifest) = self
            .load_manifest(source, shard_id.shard)
            .map_err(|e| e.into_recovery_error(shard_id))?;
        let transferred = self.restore_files(state, &snapshot_dir, &manifest)?;
        state.index().timer().stop(now_millis());

        enter_stage(state, Stage::VerifyIndex)?;
        state.start().timer().start(now_millis());
        let started = Instant::now();
        verify_files(
            state,
            transferred.iter().map(|(path, checksum)| (path.as_path(), *checksum)),
        )?;
        state
            .start()
            .set_check_index_time(started.elapsed().as_millis() as u64);
        state.start().timer().stop(now_millis());

        // snapshots hold no translog
        enter_stage(state, Stage::Translog)?;
        state.translog().timer().start(now_millis());
        state.translog().timer().stop(now_millis());

        enter_stage(state, Stage::Finalize)?;
        Ok(())
    }
}
