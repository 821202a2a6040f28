//! Observability subsystem
//!
//! This module provides:
//! - Structured logging (JSON, one line per event)
//! - Monotonic recovery metrics
//! - Formatting helpers for sizes and durations
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. Logging never fails the caller
//!
//! # Usage
//!
//! ```ignore
//! use aeroshard::observability::{Event, Logger};
//!
//! Logger::info(Event::RecoveryComplete.as_str(), &[("took", "42ms")]);
//! ```

mod events;
mod format;
mod logger;
mod metrics;

pub use events::Event;
pub use format::{format_bytes, format_millis};
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event with fields, at ERROR when the event reports a failure
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Error
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
