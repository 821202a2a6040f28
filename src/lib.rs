//! aeroshard - one-shot shard recovery from a gateway or a snapshot
//!
//! [`recovery::GatewayRecoveryService`] decides whether a recovery may run,
//! schedules it on an [`pool::ExecutionPool`] and reports exactly one
//! outcome per request.

pub mod cli;
pub mod gateway;
pub mod observability;
pub mod pool;
pub mod recovery;
pub mod shard;
pub mod snapshot;
