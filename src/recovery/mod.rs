//! Shard recovery orchestration
//!
//! A shard must populate its on-disk state before it can serve. This
//! module decides whether an attempt may run, picks the source (gateway or
//! snapshot), runs the attempt on a pool worker, classifies the result and
//! reports it once through a [`RecoveryListener`].
//!
//! # Flow
//!
//! 1. `GatewayRecoveryService::recover` checks closed state and primary role
//! 2. The shard's `recovering` gate is acquired, or the call is ignored
//! 3. The body is submitted to the execution pool; `recover` returns
//! 4. The worker transfers data, activates and refreshes the shard
//! 5. The outcome (done, ignored, failed) goes to the listener
//!
//! # Invariants
//!
//! - One outcome per `recover` call, never zero, never two
//! - At most one attempt in flight per shard
//! - Recovery stage only moves forward and freezes once the shard closes

mod errors;
mod executor;
mod listener;
mod outcome;
mod service;
mod source;
mod state;

pub use errors::{
    RecoveryCause, RecoveryError, RecoveryErrorCode, RecoveryFailure, RecoveryResult,
};
pub use listener::RecoveryListener;
pub use outcome::{classify, RecoveryOutcome, ALREADY_RECOVERING, SHARD_CLOSED};
pub use service::GatewayRecoveryService;
pub use source::RecoverySource;
pub use state::{
    now_millis, IndexProgress, IndexSnapshot, RecoverySourceDescriptor, RecoveryState,
    RecoveryStateSnapshot, RecoveryType, Stage, StartProgress, StartSnapshot, Timer,
    TranslogProgress, TranslogSnapshot,
};
