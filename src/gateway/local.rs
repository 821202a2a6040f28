//! Filesystem gateway
//!
//! Recovers `<gateway_dir>/<index>/<shard>` into `<data_dir>/<index>/<shard>`:
//!
//! 1. INDEX: copy segment files, reusing local files with equal length and CRC32
//! 2. VERIFY_INDEX: recompute the checksum of every file in place
//! 3. TRANSLOG: replay `translog/translog.jsonl` into the local translog
//! 4. FINALIZE
//!
//! The stage guard of the recovery state stops the transfer once the shard
//! closes.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::recovery::{now_millis, RecoveryError, RecoveryFailure, RecoveryState, Stage};
use crate::snapshot::checksum::compute_file_checksum;

use super::files::{list_files, shard_path, INDEX_DIR, TRANSLOG_DIR};
use super::translog::{TranslogReadError, TranslogReader, TranslogWriter, TRANSLOG_FILE};
use super::{enter_stage, ensure_open, transfer_file, verify_files, Gateway};

pub struct LocalGateway {
    gateway_dir: PathBuf,
    data_dir: PathBuf,
    closed: AtomicBool,
}

impl LocalGateway {
    pub fn new(gateway_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            gateway_dir: gateway_dir.into(),
            data_dir: data_dir.into(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn gateway_dir(&self) -> &Path {
        &self.gateway_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// INDEX stage. Returns the transferred files with their source checksums.
    fn recover_index(
        &self,
        state: &RecoveryState,
        source_dir: &Path,
        target_dir: &Path,
        index_should_exist: bool,
    ) -> Result<Vec<(PathBuf, u32)>, RecoveryError> {
        let shard_id = state.shard_id();
        enter_stage(state, Stage::Index)?;
        state.index().timer().start(now_millis());

        let sources = list_files(source_dir)
            .map_err(|e| RecoveryError::io_error_at_path(shard_id, source_dir, e))?;
        if sources.is_empty() && index_should_exist {
            return Err(RecoveryError::index_missing(shard_id, source_dir));
        }
        fs::create_dir_all(target_dir)
            .map_err(|e| RecoveryError::io_error_at_path(shard_id, target_dir, e))?;

        let mut transferred = Vec::with_capacity(sources.len());
        for file in sources {
            ensure_open(state)?;
            let checksum = compute_file_checksum(&file.path)
                .map_err(|e| RecoveryError::io_error_at_path(shard_id, &file.path, e))?;
            let target = target_dir.join(&file.name);
            transfer_file(state, &file.path, &target, file.length, checksum)?;
            transferred.push((target, checksum));
        }

        state.index().timer().stop(now_millis());
        Ok(transferred)
    }

    /// VERIFY_INDEX stage
    fn verify_index(
        &self,
        state: &RecoveryState,
        transferred: &[(PathBuf, u32)],
    ) -> Result<(), RecoveryError> {
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
        Ok(())
    }

    /// TRANSLOG stage
    fn replay_translog(
        &self,
        state: &RecoveryState,
        source: &Path,
        target: &Path,
    ) -> Result<(), RecoveryError> {
        let shard_id = state.shard_id();
        enter_stage(state, Stage::Translog)?;
        state.translog().timer().start(now_millis());

        let reader = TranslogReader::open(source)
            .map_err(|e| RecoveryError::io_error_at_path(shard_id, source, e))?;
        let mut writer = TranslogWriter::create(target)
            .map_err(|e| RecoveryError::io_error_at_path(shard_id, target, e))?;

        for operation in reader.into_iter().flatten() {
            ensure_open(state)?;
            let operation = operation.map_err(|e| match e {
                TranslogReadError::Io(e) => RecoveryError::io_error_at_path(shard_id, source, e),
                malformed @ TranslogReadError::Malformed { .. } => {
                    RecoveryError::corruption(shard_id, malformed.to_string())
                }
            })?;
            writer
                .append(&operation)
                .map_err(|e| RecoveryError::io_error_at_path(shard_id, target, e))?;
            state.translog().increment_operations();
        }
        writer
            .sync()
            .map_err(|e| RecoveryError::io_error_at_path(shard_id, target, e))?;

        state.translog().timer().stop(now_millis());
        Ok(())
    }
}

impl fmt::Display for LocalGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local gateway [{}]", self.gateway_dir.display())
    }
}

impl Gateway for LocalGateway {
    fn recover(&self, index_should_exist: bool, state: &RecoveryState) -> Result<(), RecoveryFailure> {
        let shard_id = state.shard_id();
        if self.is_closed() {
            return Err(RecoveryError::failed(shard_id, format!("{} is closed", self)).into());
        }

        let source = shard_path(&self.gateway_dir, shard_id);
        let target = shard_path(&self.data_dir, shard_id);

        let transferred = self.recover_index(
            state,
            &source.join(INDEX_DIR),
            &target.join(INDEX_DIR),
            index_should_exist,
        )?;
        self.verify_index(state, &transferred)?;
        self.replay_translog(
            state,
            &source.join(TRANSLOG_DIR).join(TRANSLOG_FILE),
            &target.join(TRANSLOG_DIR).join(TRANSLOG_FILE),
        )?;
        enter_stage(state, Stage::Finalize)?;
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
