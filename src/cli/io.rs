//! JSON output for CLI
//!
//! One JSON object per command on stdout, UTF-8, newline-terminated.

use std::io::{self, Write};

use serde_json::{json, Value};

use crate::observability::MetricsSnapshot;
use crate::recovery::{RecoveryOutcome, RecoveryStateSnapshot};
use crate::shard::{ShardId, ShardLifecycleState};

use super::errors::CliResult;

/// Everything `recover` reports
#[derive(Debug)]
pub struct RecoveryReport {
    pub shard_id: ShardId,
    pub outcome: RecoveryOutcome,
    pub shard_state: ShardLifecycleState,
    pub recovery: Option<RecoveryStateSnapshot>,
    pub metrics: MetricsSnapshot,
}

impl RecoveryReport {
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "status": self.outcome.status(),
            "shard": self.shard_id.to_string(),
            "shard_state": self.shard_state,
            "recovery": self.recovery,
            "metrics": self.metrics,
        });
        match &self.outcome {
            RecoveryOutcome::Done => {}
            RecoveryOutcome::Ignored(reason) => {
                response["reason"] = json!(reason);
            }
            RecoveryOutcome::Failed(error) => {
                response["code"] = json!(error.code().code());
                response["message"] = json!(error.to_string());
            }
        }
        response
    }
}

/// Write a JSON value as one line
pub fn write_json<W: Write>(out: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Write a report to stdout
pub fn write_report(report: &RecoveryReport) -> CliResult<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    write_json(&mut lock, &report.to_json())
}
