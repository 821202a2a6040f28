//! Shard snapshot manifest
//!
//! `manifest.json` is the authoritative descriptor of one shard inside a
//! snapshot. Every listed file must exist next to it with the recorded
//! length and checksum.
//!
//! Format:
//! ```json
//! {
//!   "snapshot": "nightly-1",
//!   "index": "logs",
//!   "shard": 0,
//!   "created_at": "2026-02-04T11:30:00Z",
//!   "files": [
//!     { "name": "_0.cfs", "length": 1024, "checksum": "crc32:deadbeef" }
//!   ],
//!   "format_version": 1
//! }
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::checksum::{compute_file_checksum, format_checksum};
use super::errors::{SnapshotError, SnapshotResult};

pub const MANIFEST_FILE: &str = "manifest.json";

const FORMAT_VERSION: u8 = 1;

/// One file recorded in a manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotFile {
    pub name: String,
    pub length: u64,
    /// `crc32:xxxxxxxx`
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotManifest {
    pub snapshot: String,
    pub index: String,
    pub shard: u32,
    /// RFC3339
    pub created_at: String,
    pub files: Vec<SnapshotFile>,
    pub format_version: u8,
}

impl SnapshotManifest {
    pub fn new(
        snapshot: impl Into<String>,
        index: impl Into<String>,
        shard: u32,
        files: Vec<SnapshotFile>,
    ) -> Self {
        Self {
            snapshot: snapshot.into(),
            index: index.into(),
            shard,
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            files,
            format_version: FORMAT_VERSION,
        }
    }

    /// Describes every regular file in `dir` except the manifest itself,
    /// sorted by name.
    pub fn describe_dir(
        snapshot: impl Into<String>,
        index: impl Into<String>,
        shard: u32,
        dir: &Path,
    ) -> SnapshotResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| SnapshotError::io(dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SnapshotError::io(dir, e))?;
            let path = entry.path();
            let metadata = entry.metadata().map_err(|e| SnapshotError::io(&path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !metadata.is_file() || name == MANIFEST_FILE {
                continue;
            }
            let checksum = compute_file_checksum(&path).map_err(|e| SnapshotError::io(&path, e))?;
            files.push(SnapshotFile {
                name,
                length: metadata.len(),
                checksum: format_checksum(checksum),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self::new(snapshot, index, shard, files))
    }

    pub fn to_json(&self) -> SnapshotResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::Manifest(format!("failed to serialize: {}", e)))
    }

    pub fn from_json(json: &str) -> SnapshotResult<Self> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(|e| SnapshotError::Manifest(format!("failed to parse: {}", e)))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(SnapshotError::Manifest(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        Ok(manifest)
    }

    /// Writes the manifest and fsyncs it.
    pub fn write_to_file(&self, path: &Path) -> SnapshotResult<()> {
        let json = self.to_json()?;
        let mut file = File::create(path).map_err(|e| SnapshotError::io(path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| SnapshotError::io(path, e))?;
        file.sync_all().map_err(|e| SnapshotError::io(path, e))?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> SnapshotResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| SnapshotError::io(path, e))?;
        Self::from_json(&json)
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }
}
