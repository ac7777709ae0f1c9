//! Coordinator link
//!
//! One process hosts the [`Coordinator`](crate::coordinator::Coordinator);
//! every other process reaches it through whatever transport the platform
//! provides. [`CoordinatorLink`] pins the operation surface that transport
//! must carry. [`LocalLink`] is the same-process implementation; tests
//! substitute scripted links to exercise the failure paths.
//!
//! A link call either completes on the coordinator or fails as a
//! [`LinkError`]. Callers treat any failure on the allocate path as pool
//! exhaustion rather than retrying forever; a coordinator that cannot be
//! reached cannot grant pits.

use std::sync::Arc;

use berth_pool::{AllocateOutcome, Binding, Dedup, ReleaseOutcome, SubPoolKey, TableSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;
use crate::coordinator::Coordinator;
use crate::store::BindStore;

/// Transport failures between a client and the coordinator
#[derive(Debug, Error)]
pub enum LinkError {
    /// The coordinator did not answer within the bounded wait
    #[error("coordinator did not answer within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The coordinator process is gone or not yet up
    #[error("coordinator unavailable: {reason}")]
    Unavailable { reason: String },
    /// The transport delivered something the protocol does not allow
    #[error("link protocol violation: {reason}")]
    Protocol { reason: String },
}

/// Full table state as served to mirrors, tagged with the journal position
/// it reflects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// Journal sequence number the snapshot includes up to
    pub head_seq: u64,
    /// The allocation table at that point
    pub table: TableSnapshot,
}

/// The operation surface a transport must carry to the coordinator
pub trait CoordinatorLink: Send + Sync {
    /// Ask the coordinator for a pit in the sub-pool
    fn allocate(
        &self,
        key: SubPoolKey,
        binding: Binding,
        dedup: Dedup,
    ) -> Result<AllocateOutcome, LinkError>;

    /// Hand a pit back to the coordinator
    fn release(&self, pit: &str, generation: u64) -> Result<ReleaseOutcome, LinkError>;

    /// Pull the full table state
    fn snapshot(&self) -> Result<SyncSnapshot, LinkError>;
}

/// Link for clients living in the coordinator's own process
pub struct LocalLink<S: BindStore, C: Clock> {
    coordinator: Arc<Coordinator<S, C>>,
}

impl<S: BindStore, C: Clock> LocalLink<S, C> {
    pub fn new(coordinator: Arc<Coordinator<S, C>>) -> Self {
        Self { coordinator }
    }
}

impl<S: BindStore, C: Clock> CoordinatorLink for LocalLink<S, C> {
    fn allocate(
        &self,
        key: SubPoolKey,
        binding: Binding,
        dedup: Dedup,
    ) -> Result<AllocateOutcome, LinkError> {
        Ok(self.coordinator.allocate(key, binding, dedup))
    }

    fn release(&self, pit: &str, generation: u64) -> Result<ReleaseOutcome, LinkError> {
        Ok(self.coordinator.release(pit, generation))
    }

    fn snapshot(&self) -> Result<SyncSnapshot, LinkError> {
        Ok(self.coordinator.snapshot())
    }
}
