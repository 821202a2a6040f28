//! Shard file helpers shared by gateway and snapshot recovery
//!
//! Layout of a shard under any root:
//!
//! ```text
//! <root>/<index>/<shard>/index/      segment files
//! <root>/<index>/<shard>/translog/   translog.jsonl
//! ```

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::shard::ShardId;
use crate::snapshot::checksum::compute_file_checksum;

pub const INDEX_DIR: &str = "index";
pub const TRANSLOG_DIR: &str = "translog";

/// A file found in a source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub path: PathBuf,
    pub length: u64,
}

/// `<root>/<index>/<shard>`
pub fn shard_path(root: &Path, shard_id: &ShardId) -> PathBuf {
    root.join(&shard_id.index).join(shard_id.shard.to_string())
}

/// Regular files directly under `dir`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn list_files(dir: &Path) -> io::Result<Vec<SourceFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        files.push(SourceFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            length: metadata.len(),
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Whether `target` already holds a file of `length` bytes with `checksum`.
pub fn is_reusable(target: &Path, length: u64, checksum: u32) -> io::Result<bool> {
    let metadata = match fs::metadata(target) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if !metadata.is_file() || metadata.len() != length {
        return Ok(false);
    }
    Ok(compute_file_checksum(target)? == checksum)
}

/// Copies `source` to `target` through a temporary file, fsyncs it and
/// renames it into place. Returns the number of bytes copied.
pub fn copy_file_synced(source: &Path, target: &Path) -> io::Result<u64> {
    let mut temp_name = target.as_os_str().to_owned();
    temp_name.push(".recovering");
    let temp = PathBuf::from(temp_name);

    let copied = fs::copy(source, &temp)?;
    File::open(&temp)?.sync_all()?;
    fs::rename(&temp, target)?;
    Ok(copied)
}
