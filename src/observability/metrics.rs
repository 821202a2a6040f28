//! Recovery metrics registry
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Shared by `Arc` between the service and its workers

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of the recovery path
///
/// Uses Relaxed ordering: counters are observational, nothing synchronizes on them.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    recoveries_requested: AtomicU64,
    recoveries_scheduled: AtomicU64,
    recoveries_completed: AtomicU64,
    recoveries_ignored: AtomicU64,
    recoveries_failed: AtomicU64,
    files_recovered: AtomicU64,
    bytes_recovered: AtomicU64,
    files_reused: AtomicU64,
    bytes_reused: AtomicU64,
    translog_operations: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requested(&self) {
        self.recoveries_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scheduled(&self) {
        self.recoveries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.recoveries_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ignored(&self) {
        self.recoveries_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.recoveries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Add transfer totals of a completed recovery
    pub fn add_transfer(
        &self,
        files_recovered: u64,
        bytes_recovered: u64,
        files_reused: u64,
        bytes_reused: u64,
        translog_operations: u64,
    ) {
        self.files_recovered.fetch_add(files_recovered, Ordering::Relaxed);
        self.bytes_recovered.fetch_add(bytes_recovered, Ordering::Relaxed);
        self.files_reused.fetch_add(files_reused, Ordering::Relaxed);
        self.bytes_reused.fetch_add(bytes_reused, Ordering::Relaxed);
        self.translog_operations
            .fetch_add(translog_operations, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            recoveries_requested: self.recoveries_requested.load(Ordering::Relaxed),
            recoveries_scheduled: self.recoveries_scheduled.load(Ordering::Relaxed),
            recoveries_completed: self.recoveries_completed.load(Ordering::Relaxed),
            recoveries_ignored: self.recoveries_ignored.load(Ordering::Relaxed),
            recoveries_failed: self.recoveries_failed.load(Ordering::Relaxed),
            files_recovered: self.files_recovered.load(Ordering::Relaxed),
            bytes_recovered: self.bytes_recovered.load(Ordering::Relaxed),
            files_reused: self.files_reused.load(Ordering::Relaxed),
            bytes_reused: self.bytes_reused.load(Ordering::Relaxed),
            translog_operations: self.translog_operations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub recoveries_requested: u64,
    pub recoveries_scheduled: u64,
    pub recoveries_completed: u64,
    pub recoveries_ignored: u64,
    pub recoveries_failed: u64,
    pub files_recovered: u64,
    pub bytes_recovered: u64,
    pub files_reused: u64,
    pub bytes_reused: u64,
    pub translog_operations: u64,
}

impl MetricsSnapshot {
    /// Outcomes delivered so far
    pub fn outcomes(&self) -> u64 {
        self.recoveries_completed + self.recoveries_ignored + self.recoveries_failed
    }
}
