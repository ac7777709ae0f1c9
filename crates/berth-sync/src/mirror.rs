//! Client-side table mirror
//!
//! Satellite processes never hold the authoritative table. A [`TableMirror`]
//! forwards every mutation over its [`CoordinatorLink`] and keeps a local
//! read cache it refreshes from coordinator snapshots after each successful
//! round trip. The cache answers lookups cheaply between round trips; it is
//! advisory and may lag.
//!
//! When the coordinator cannot be reached, allocation reports
//! [`AllocateOutcome::Exhausted`] to the caller. A coordinator that is gone
//! cannot grant pits, and callers already handle exhaustion.

use std::collections::BTreeMap;
use std::sync::Arc;

use berth_directive::{Directive, ProcessSelector};
use berth_pool::{
    classify_theme, AllocateOutcome, AllocationRecord, Binding, Dedup, LaunchBehavior, PitCatalog,
    PoolError, ReleaseOutcome, SubPoolKey, TableSnapshot,
};
use parking_lot::RwLock;

use crate::link::{CoordinatorLink, LinkError};

/// Everything a host needs to route one screen launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Plugin the screen lives in
    pub plugin: String,
    /// Screen class name inside the plugin
    pub screen: String,
    /// Process the screen asked to run in
    pub process: ProcessSelector,
    /// Declared task affinity, if any
    pub affinity: Option<String>,
    /// Launch behavior declared by the screen
    pub behavior: LaunchBehavior,
    /// Theme name, used to resolve translucency
    pub theme: String,
}

/// Result of routing one launch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The launch maps to this directive
    Routed(Directive),
    /// No pit was available in the launch's sub-pool
    Exhausted,
}

struct MirrorCache {
    table: TableSnapshot,
    head_seq: u64,
}

/// Read-mostly replica of the coordinator's table
pub struct TableMirror<L: CoordinatorLink> {
    catalog: Arc<PitCatalog>,
    link: L,
    cache: RwLock<MirrorCache>,
}

impl<L: CoordinatorLink> TableMirror<L> {
    /// A mirror with an empty cache. Call [`refresh`](Self::refresh) to pull
    /// the first snapshot, or let the first round trip do it.
    pub fn new(catalog: Arc<PitCatalog>, link: L) -> Self {
        Self {
            catalog,
            link,
            cache: RwLock::new(MirrorCache {
                table: TableSnapshot {
                    records: BTreeMap::new(),
                },
                head_seq: 0,
            }),
        }
    }

    /// The catalog this mirror routes against
    pub fn catalog(&self) -> &PitCatalog {
        &self.catalog
    }

    /// Pull a fresh snapshot from the coordinator.
    ///
    /// Returns the journal position the cache now reflects. An older
    /// snapshot must not roll the cache back, so stale answers are kept
    /// and the newer cache wins.
    pub fn refresh(&self) -> Result<u64, LinkError> {
        let snapshot = self.link.snapshot()?;
        let mut cache = self.cache.write();
        if snapshot.head_seq >= cache.head_seq {
            cache.head_seq = snapshot.head_seq;
            cache.table = snapshot.table;
        }
        Ok(cache.head_seq)
    }

    /// Journal position the cache currently reflects
    pub fn cached_head_seq(&self) -> u64 {
        self.cache.read().head_seq
    }

    /// Record for a pit, answered from the cache
    pub fn lookup(&self, pit: &str) -> Option<AllocationRecord> {
        self.cache.read().table.records.get(pit).cloned()
    }

    /// Ask the coordinator for a pit.
    ///
    /// Link failures surface as exhaustion; the caller's no-pit path is the
    /// right degradation when the coordinator is gone.
    pub fn allocate(&self, key: SubPoolKey, binding: Binding, dedup: Dedup) -> AllocateOutcome {
        match self.link.allocate(key, binding, dedup) {
            Ok(outcome) => {
                self.refresh_after_round_trip();
                outcome
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    key = %key,
                    "coordinator unreachable, reporting exhaustion"
                );
                AllocateOutcome::Exhausted
            }
        }
    }

    /// Hand a pit back through the coordinator
    pub fn release(&self, pit: &str, generation: u64) -> Result<ReleaseOutcome, LinkError> {
        let outcome = self.link.release(pit, generation)?;
        self.refresh_after_round_trip();
        Ok(outcome)
    }

    fn refresh_after_round_trip(&self) {
        if let Err(err) = self.refresh() {
            tracing::debug!(error = %err, "mirror refresh failed, cache is stale");
        }
    }

    /// Route one launch request end to end.
    ///
    /// Classifies the request onto its sub-pool, allocates with a reuse hint
    /// when the behavior asks to rejoin an existing screen, and assembles
    /// the directive the wire codec will carry.
    pub fn launch_directive(&self, request: &LaunchRequest) -> Result<LaunchOutcome, PoolError> {
        let key = classify_theme(
            &self.catalog,
            request.affinity.as_deref(),
            request.behavior,
            &request.theme,
        )?;
        let dedup = if request.behavior.reuses_existing() {
            Dedup::ReuseExisting
        } else {
            Dedup::Fresh
        };
        let binding = Binding::new(&request.plugin, &request.screen, request.process);

        match self.allocate(key, binding, dedup) {
            AllocateOutcome::Granted(grant) => Ok(LaunchOutcome::Routed(Directive {
                plugin: request.plugin.clone(),
                screen: request.screen.clone(),
                process: request.process,
                container: grant.pit,
                counter: grant.generation,
            })),
            AllocateOutcome::Exhausted => Ok(LaunchOutcome::Exhausted),
        }
    }
}
