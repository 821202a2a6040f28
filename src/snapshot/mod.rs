//! Snapshot restore
//!
//! A snapshot holds a point-in-time copy of a shard's index files plus a
//! `manifest.json` recording each file's length and CRC32. Restoring copies
//! the files into the shard's data directory, verifies every checksum and
//! replays no translog.

pub mod checksum;
mod errors;
mod manifest;
mod restore;

pub use checksum::{compute_checksum, compute_file_checksum, format_checksum, parse_checksum};
pub use errors::{SnapshotError, SnapshotResult};
pub use manifest::{SnapshotFile, SnapshotManifest, MANIFEST_FILE};
pub use restore::LocalSnapshotRestore;
