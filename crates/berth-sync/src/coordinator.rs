//! Allocation coordinator
//!
//! The coordinator owns the authoritative [`PitTable`] for the whole host.
//! Every mutation runs under one lock and produces three effects in order:
//! the durable store is updated, the commit lands in the journal, and
//! registered hooks see the commit. Mirrors in other processes rebuild
//! their view from the journal and snapshots; they never mutate.
//!
//! The coordinator starts with a fresh table and recovers on the first
//! [`reconcile`](Coordinator::reconcile), once the host can report which
//! pits are actually live. Restoring before liveness is known would rebind
//! pits whose processes died with the previous coordinator.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use berth_pool::{
    AllocateOutcome, AllocationRecord, BindRecord, Binding, Dedup, PitCatalog, PitTable,
    ReconcileReport, ReleaseOutcome, SubPoolKey, TableEvent,
};
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::journal::{BindCommit, BindJournal};
use crate::link::SyncSnapshot;
use crate::store::BindStore;

/// Callback invoked with every commit as it lands.
///
/// Hooks run under the table lock; keep them short. Hosts use them to fan
/// commits out to satellite processes.
pub type CommitHook = Box<dyn Fn(&BindCommit) + Send + Sync>;

struct CoordinatorState<S> {
    table: PitTable,
    journal: BindJournal,
    store: S,
    hooks: Vec<CommitHook>,
}

impl<S: BindStore> CoordinatorState<S> {
    fn commit(&mut self, events: Vec<TableEvent>, stamp: u64) {
        for event in events {
            self.persist(&event);
            let commit = self.journal.append(event, stamp);
            for hook in &self.hooks {
                hook(&commit);
            }
        }
    }

    /// Mirror one event into the durable store. Store failures are logged
    /// and do not undo the table mutation; reconcile repairs drift later.
    fn persist(&mut self, event: &TableEvent) {
        let result = match event {
            TableEvent::Bound {
                pit,
                binding,
                generation,
                stamp,
            }
            | TableEvent::Restored {
                pit,
                binding,
                generation,
                stamp,
            } => {
                let record = BindRecord {
                    plugin: binding.plugin.clone(),
                    screen: binding.screen.clone(),
                    generation: *generation,
                    stamp: *stamp,
                };
                self.store.save(pit, &record)
            }
            TableEvent::Freed { pit, .. } | TableEvent::ForceFreed { pit } => {
                self.store.remove(pit)
            }
            TableEvent::Quarantined { .. } => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!(pit = %event.pit(), error = %err, "bind store write failed");
        }
    }
}

/// Single authority over the allocation table
pub struct Coordinator<S: BindStore, C: Clock> {
    catalog: Arc<PitCatalog>,
    clock: C,
    state: Mutex<CoordinatorState<S>>,
}

impl<S: BindStore, C: Clock> Coordinator<S, C> {
    /// A coordinator over a fresh table. Durable records are consulted on
    /// the first reconcile, not here.
    pub fn new(catalog: Arc<PitCatalog>, store: S, clock: C) -> Self {
        let table = PitTable::new(&catalog);
        Self {
            catalog,
            clock,
            state: Mutex::new(CoordinatorState {
                table,
                journal: BindJournal::new(),
                store,
                hooks: Vec::new(),
            }),
        }
    }

    /// The catalog this coordinator allocates from
    pub fn catalog(&self) -> &PitCatalog {
        &self.catalog
    }

    /// Allocate a pit from the sub-pool
    pub fn allocate(&self, key: SubPoolKey, binding: Binding, dedup: Dedup) -> AllocateOutcome {
        let stamp = self.clock.now_ms();
        let mut state = self.state.lock();
        let (outcome, events) = state.table.allocate(&self.catalog, key, binding, dedup, stamp);
        state.commit(events, stamp);

        match &outcome {
            AllocateOutcome::Granted(grant) if grant.reused => {
                tracing::debug!(
                    pit = %grant.pit,
                    generation = grant.generation,
                    "reusing existing allocation"
                );
            }
            AllocateOutcome::Granted(grant) => {
                tracing::debug!(
                    pit = %grant.pit,
                    generation = grant.generation,
                    key = %key,
                    "granted pit"
                );
            }
            AllocateOutcome::Exhausted => {
                tracing::info!(key = %key, "sub-pool exhausted");
            }
        }
        outcome
    }

    /// Release a pit claimed at `expected_generation`
    pub fn release(&self, pit: &str, expected_generation: u64) -> ReleaseOutcome {
        let stamp = self.clock.now_ms();
        let mut state = self.state.lock();
        let (outcome, events) = state.table.release(pit, expected_generation);
        state.commit(events, stamp);

        match &outcome {
            ReleaseOutcome::Freed { generation } => {
                tracing::debug!(pit = %pit, generation = *generation, "freed pit");
            }
            ReleaseOutcome::StaleGeneration { expected, current } => {
                tracing::debug!(
                    pit = %pit,
                    expected = *expected,
                    current = *current,
                    "stale release ignored"
                );
            }
            ReleaseOutcome::AlreadyFree => {
                tracing::debug!(pit = %pit, "release of free pit ignored");
            }
            ReleaseOutcome::UnknownPit => {
                tracing::debug!(pit = %pit, "release of unknown pit ignored");
            }
        }
        outcome
    }

    /// Current record for a pit
    pub fn lookup(&self, pit: &str) -> Option<AllocationRecord> {
        self.state.lock().table.lookup(pit)
    }

    /// Reconcile the table against the set of pits the host reports live.
    ///
    /// Loads the durable records, lets the table sort every pit into
    /// force-freed, restored or quarantined, commits the resulting events,
    /// then drops durable records for pits that did not come back allocated.
    pub fn reconcile(&self, live: &BTreeSet<String>) -> ReconcileReport {
        let stamp = self.clock.now_ms();
        let mut state = self.state.lock();
        let durable = match state.store.load_all() {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, "bind store unreadable, reconciling without it");
                BTreeMap::new()
            }
        };
        let (report, events) = state.table.reconcile(live, &durable);
        state.commit(events, stamp);

        for pit in durable.keys() {
            let allocated = state
                .table
                .lookup(pit)
                .map(|r| r.is_allocated())
                .unwrap_or(false);
            if !allocated {
                if let Err(err) = state.store.remove(pit) {
                    tracing::warn!(pit = %pit, error = %err, "failed to drop stale bind record");
                }
            }
        }

        tracing::info!(
            force_freed = report.force_freed.len(),
            restored = report.restored.len(),
            quarantined = report.quarantined.len(),
            "reconciled allocation table"
        );
        report
    }

    /// Full table state tagged with the journal head
    pub fn snapshot(&self) -> SyncSnapshot {
        let state = self.state.lock();
        SyncSnapshot {
            head_seq: state.journal.head_seq(),
            table: state.table.snapshot(),
        }
    }

    /// Register a hook for future commits
    pub fn register_hook(&self, hook: impl Fn(&BindCommit) + Send + Sync + 'static) {
        self.state.lock().hooks.push(Box::new(hook));
    }

    /// Retained commits newer than `seq`
    pub fn commits_after(&self, seq: u64) -> Vec<BindCommit> {
        self.state.lock().journal.commits_after(seq).to_vec()
    }

    /// Journal position of the newest commit
    pub fn head_seq(&self) -> u64 {
        self.state.lock().journal.head_seq()
    }

    /// Recheck the retained journal chain
    pub fn verify_journal(&self) -> bool {
        self.state.lock().journal.verify_integrity()
    }

    /// Free pits remaining in a sub-pool
    pub fn free_in(&self, key: SubPoolKey) -> usize {
        self.state.lock().table.free_in(&self.catalog, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_directive::ProcessSelector;
    use berth_pool::{LaunchBehavior, PoolLayout};

    use crate::store::MemoryBindStore;

    struct ZeroClock;

    impl Clock for ZeroClock {
        fn now_ms(&self) -> u64 {
            0
        }
    }

    fn test_coordinator() -> Coordinator<MemoryBindStore, ZeroClock> {
        let layout = PoolLayout {
            groups: 2,
            stem: String::from("Pit"),
            opaque_counts: [2, 1, 1, 1],
            translucent_counts: [1, 1, 1, 1],
            ..PoolLayout::default()
        };
        let catalog = Arc::new(PitCatalog::new(layout).unwrap());
        Coordinator::new(catalog, MemoryBindStore::new(), ZeroClock)
    }

    fn standard_key() -> SubPoolKey {
        SubPoolKey {
            group: 0,
            behavior: LaunchBehavior::Standard,
            translucent: false,
        }
    }

    #[test]
    fn test_allocate_release_round_trip() {
        let coordinator = test_coordinator();
        let key = standard_key();

        let outcome = coordinator.allocate(
            key,
            Binding::new("shop", "Detail", ProcessSelector::Auto),
            Dedup::Fresh,
        );
        let grant = outcome.grant().unwrap().clone();
        assert_eq!(coordinator.free_in(key), 1);

        let released = coordinator.release(&grant.pit, grant.generation);
        assert!(released.is_freed());
        assert_eq!(coordinator.free_in(key), 2);
    }

    #[test]
    fn test_snapshot_carries_journal_head() {
        let coordinator = test_coordinator();
        assert_eq!(coordinator.snapshot().head_seq, 0);

        coordinator.allocate(
            standard_key(),
            Binding::new("shop", "Detail", ProcessSelector::Auto),
            Dedup::Fresh,
        );
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.head_seq, 1);
        assert_eq!(snapshot.head_seq, coordinator.head_seq());
        assert!(coordinator.verify_journal());
    }

    #[test]
    fn test_exhausted_commits_nothing() {
        let coordinator = test_coordinator();
        let key = standard_key();

        for i in 0..2 {
            let binding = Binding::new("shop", &format!("S{i}"), ProcessSelector::Auto);
            assert!(coordinator.allocate(key, binding, Dedup::Fresh).grant().is_some());
        }
        let binding = Binding::new("shop", "S2", ProcessSelector::Auto);
        assert!(coordinator.allocate(key, binding, Dedup::Fresh).is_exhausted());
        assert_eq!(coordinator.head_seq(), 2);
    }
}
