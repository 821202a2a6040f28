//! In-process shard with a guarded lifecycle
//!
//! All lifecycle transitions happen under one mutex, which makes
//! `recovering` an atomic compare-and-set on the state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::observability::{Event, Logger};
use crate::recovery::{RecoverySourceDescriptor, RecoveryState, RecoveryType};

use super::errors::{ShardError, ShardResult};
use super::routing::{RoutingAssignment, ShardId};
use super::state::ShardLifecycleState;
use super::{RecoveringTransition, Shard};

struct ShardInner {
    state: ShardLifecycleState,
    routing: RoutingAssignment,
    recovery_state: Option<Arc<RecoveryState>>,
}

/// A shard whose lifecycle is tracked in memory.
pub struct IndexShard {
    shard_id: ShardId,
    inner: Mutex<ShardInner>,
    post_recovery_calls: AtomicU64,
    refresh_calls: AtomicU64,
}

impl IndexShard {
    /// Creates a shard in `NOT_STARTED`.
    pub fn new(shard_id: ShardId, routing: RoutingAssignment) -> Self {
        Self {
            shard_id,
            inner: Mutex::new(ShardInner {
                state: ShardLifecycleState::NotStarted,
                routing,
                recovery_state: None,
            }),
            post_recovery_calls: AtomicU64::new(0),
            refresh_calls: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, inner: &mut ShardInner, to: ShardLifecycleState, reason: &str) {
        let from = inner.state;
        inner.state = to;
        Logger::trace(
            Event::ShardStateChanged.as_str(),
            &[
                ("from", from.as_str()),
                ("reason", reason),
                ("shard", &self.shard_id.to_string()),
                ("to", to.as_str()),
            ],
        );
    }

    /// Replaces the routing entry. Called by the cluster layer.
    pub fn update_routing(&self, routing: RoutingAssignment) {
        self.lock().routing = routing;
    }

    /// Recovery state of the latest attempt, if any.
    pub fn recovery_state(&self) -> Option<Arc<RecoveryState>> {
        self.lock().recovery_state.clone()
    }

    /// Marks the shard started. Only valid from `POST_RECOVERY`.
    pub fn start(&self, reason: &str) -> ShardResult<()> {
        let mut inner = self.lock();
        match inner.state {
            ShardLifecycleState::PostRecovery => {
                self.transition(&mut inner, ShardLifecycleState::Started, reason);
                Ok(())
            }
            ShardLifecycleState::Closed => Err(ShardError::Closed(self.shard_id.clone())),
            state => Err(ShardError::illegal_state(
                &self.shard_id,
                state,
                "shard can only be started after post recovery",
            )),
        }
    }

    /// Closes the shard. Idempotent.
    ///
    /// Freezes the current recovery state so its stage stops advancing.
    pub fn close(&self, reason: &str) {
        let mut inner = self.lock();
        if inner.state.is_closed() {
            return;
        }
        if let Some(recovery_state) = &inner.recovery_state {
            recovery_state.freeze();
        }
        self.transition(&mut inner, ShardLifecycleState::Closed, reason);
    }

    /// Number of successful `post_recovery` transitions.
    pub fn post_recovery_count(&self) -> u64 {
        self.post_recovery_calls.load(Ordering::SeqCst)
    }

    /// Number of successful refreshes.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl Shard for IndexShard {
    fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    fn state(&self) -> ShardLifecycleState {
        self.lock().state
    }

    fn routing_entry(&self) -> RoutingAssignment {
        self.lock().routing.clone()
    }

    fn recovering(
        &self,
        reason: &str,
        recovery_type: RecoveryType,
        source: RecoverySourceDescriptor,
    ) -> RecoveringTransition {
        let mut inner = self.lock();
        match inner.state {
            ShardLifecycleState::NotStarted => {
                let recovery_state = Arc::new(RecoveryState::new(
                    self.shard_id.clone(),
                    recovery_type,
                    source,
                ));
                inner.recovery_state = Some(Arc::clone(&recovery_state));
                self.transition(&mut inner, ShardLifecycleState::Recovering, reason);
                RecoveringTransition::Acquired(recovery_state)
            }
            ShardLifecycleState::Closed => RecoveringTransition::Closed,
            state => RecoveringTransition::AlreadyInProgress { state },
        }
    }

    fn post_recovery(&self, reason: &str) -> ShardResult<()> {
        let mut inner = self.lock();
        match inner.state {
            ShardLifecycleState::Recovering => {
                self.transition(&mut inner, ShardLifecycleState::PostRecovery, reason);
                self.post_recovery_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            ShardLifecycleState::Closed => Err(ShardError::Closed(self.shard_id.clone())),
            state => Err(ShardError::illegal_state(
                &self.shard_id,
                state,
                "post recovery is only allowed while recovering",
            )),
        }
    }

    fn refresh(&self, _reason: &str) -> ShardResult<()> {
        match self.lock().state {
            ShardLifecycleState::Closed => Err(ShardError::Closed(self.shard_id.clone())),
            ShardLifecycleState::NotStarted => Err(ShardError::NotStarted {
                shard: self.shard_id.clone(),
                state: ShardLifecycleState::NotStarted,
            }),
            _ => {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}
