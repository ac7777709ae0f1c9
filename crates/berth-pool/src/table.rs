//! Allocation table - the FREE/ALLOCATED state machine over the catalog
//!
//! One logical table exists per OS process; the authoritative copy lives in
//! the coordinator process and everyone else works from replicas. The table
//! itself is pure: every mutation returns its outcome together with the
//! [`TableEvent`]s describing what changed, and the runtime layer decides
//! what to do with them (journal, persist, broadcast). Replaying the same
//! events against a fresh table of the same catalog rebuilds the same state.
//!
//! Callers serialize access; nothing in here locks.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use berth_directive::ProcessSelector;
use serde::{Deserialize, Serialize};

use crate::catalog::PitCatalog;
use crate::types::{AllocationRecord, BindRecord, Binding, PitState, SubPoolKey};

/// Allocation hint: reuse an existing binding or always take a fresh pit.
///
/// Also what makes coordinator allocates idempotent under retry: a retried
/// `ReuseExisting` call finds the binding its first attempt made.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dedup {
    /// Always claim a fresh pit
    Fresh,
    /// Return an existing allocation of the same (plugin, screen) as-is
    ReuseExisting,
}

/// A successful allocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Pit identity to declare to the OS
    pub pit: String,
    /// Position of the pit within its sub-pool
    pub capacity_index: u8,
    /// Generation the binding holds; quote it back on release
    pub generation: u64,
    /// True when dedup returned an existing binding
    pub reused: bool,
}

/// Outcome of an allocate call. Exhaustion is an outcome, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocateOutcome {
    /// A pit was granted
    Granted(Grant),
    /// Every eligible pit is claimed
    Exhausted,
}

impl AllocateOutcome {
    /// The grant, when one was made
    pub fn grant(&self) -> Option<&Grant> {
        match self {
            AllocateOutcome::Granted(g) => Some(g),
            AllocateOutcome::Exhausted => None,
        }
    }

    /// True for [`AllocateOutcome::Exhausted`]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, AllocateOutcome::Exhausted)
    }
}

/// Outcome of a release call. Everything except `Freed` left the table
/// untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseOutcome {
    /// The pit went back to FREE
    Freed { generation: u64 },
    /// Caller quoted a generation the pit no longer holds
    StaleGeneration { expected: u64, current: u64 },
    /// The pit was already FREE
    AlreadyFree,
    /// No such pit in this table
    UnknownPit,
}

impl ReleaseOutcome {
    /// True when the release freed the pit
    pub fn is_freed(&self) -> bool {
        matches!(self, ReleaseOutcome::Freed { .. })
    }
}

/// One table mutation. The unit the journal records and replicas replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableEvent {
    /// A fresh allocation claimed the pit
    Bound {
        pit: String,
        binding: Binding,
        generation: u64,
        stamp: u64,
    },
    /// A release returned the pit to FREE
    Freed { pit: String, generation: u64 },
    /// Reconcile freed a pit the OS no longer reports live
    ForceFreed { pit: String },
    /// Reconcile rebound a live pit from its durable record
    Restored {
        pit: String,
        binding: Binding,
        generation: u64,
        stamp: u64,
    },
    /// Reconcile quarantined a live pit nothing claims
    Quarantined { pit: String },
}

impl TableEvent {
    /// The pit this event touches
    pub fn pit(&self) -> &str {
        match self {
            TableEvent::Bound { pit, .. }
            | TableEvent::Freed { pit, .. }
            | TableEvent::ForceFreed { pit }
            | TableEvent::Restored { pit, .. }
            | TableEvent::Quarantined { pit } => pit,
        }
    }
}

/// What one reconcile pass did
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Pits freed because the OS no longer reports them
    pub force_freed: Vec<String>,
    /// Pits rebound from durable records
    pub restored: Vec<String>,
    /// Live pits nothing could confirm
    pub quarantined: Vec<String>,
}

impl ReconcileReport {
    /// True when reconcile changed nothing
    pub fn is_clean(&self) -> bool {
        self.force_freed.is_empty() && self.restored.is_empty() && self.quarantined.is_empty()
    }
}

/// Serializable copy of every record, the unit replicas install wholesale
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Every pit's record, keyed by pit name
    pub records: BTreeMap<String, AllocationRecord>,
}

/// The allocation table. One record per catalog pit, keyed by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PitTable {
    /// Per-pit records
    pub records: BTreeMap<String, AllocationRecord>,
}

impl PitTable {
    /// Build a table with every catalog pit FREE at generation 0
    pub fn new(catalog: &PitCatalog) -> Self {
        let records = catalog
            .pits()
            .iter()
            .map(|p| (p.name.clone(), AllocationRecord::default()))
            .collect();
        Self { records }
    }

    /// Rebuild a table from a snapshot
    pub fn from_snapshot(snapshot: TableSnapshot) -> Self {
        Self {
            records: snapshot.records,
        }
    }

    /// Claim a pit in `key` for `binding`.
    ///
    /// Scans the sub-pool in ascending capacity-index order and takes the
    /// first FREE pit, bumping its generation. Quarantined pits are skipped.
    /// With [`Dedup::ReuseExisting`], an allocation already bound to the same
    /// (plugin, screen) is returned as-is without consuming capacity; the
    /// process field is not compared.
    pub fn allocate(
        &mut self,
        catalog: &PitCatalog,
        key: SubPoolKey,
        binding: Binding,
        dedup: Dedup,
        stamp: u64,
    ) -> (AllocateOutcome, Vec<TableEvent>) {
        if dedup == Dedup::ReuseExisting {
            for pit in catalog.sub_pool(key) {
                let record = match self.records.get(&pit.name) {
                    Some(r) => r,
                    None => continue,
                };
                if record.state != PitState::Allocated {
                    continue;
                }
                if let Some(bound) = &record.binding {
                    if bound.matches(&binding.plugin, &binding.screen) {
                        let grant = Grant {
                            pit: pit.name.clone(),
                            capacity_index: pit.capacity_index,
                            generation: record.generation,
                            reused: true,
                        };
                        return (AllocateOutcome::Granted(grant), Vec::new());
                    }
                }
            }
        }

        for pit in catalog.sub_pool(key) {
            let record = match self.records.get_mut(&pit.name) {
                Some(r) => r,
                None => continue,
            };
            if record.state != PitState::Free {
                continue;
            }
            record.state = PitState::Allocated;
            record.generation += 1;
            record.stamp = stamp;
            record.binding = Some(binding.clone());
            let generation = record.generation;
            let grant = Grant {
                pit: pit.name.clone(),
                capacity_index: pit.capacity_index,
                generation,
                reused: false,
            };
            let event = TableEvent::Bound {
                pit: pit.name.clone(),
                binding,
                generation,
                stamp,
            };
            return (AllocateOutcome::Granted(grant), alloc::vec![event]);
        }

        (AllocateOutcome::Exhausted, Vec::new())
    }

    /// Return a pit to FREE.
    ///
    /// Only frees an allocated pit when `expected_generation` matches its
    /// current generation; a mismatch means the caller is releasing a binding
    /// that has since been reassigned, and is a no-op. A quarantined pit is
    /// freed regardless of generation: nothing else can own it, and holding
    /// it forever would leak capacity.
    pub fn release(
        &mut self,
        pit: &str,
        expected_generation: u64,
    ) -> (ReleaseOutcome, Vec<TableEvent>) {
        let record = match self.records.get_mut(pit) {
            Some(r) => r,
            None => return (ReleaseOutcome::UnknownPit, Vec::new()),
        };
        match record.state {
            PitState::Free => (ReleaseOutcome::AlreadyFree, Vec::new()),
            PitState::AllocatedUnknown => {
                let generation = record.generation;
                record.state = PitState::Free;
                record.binding = None;
                let event = TableEvent::Freed {
                    pit: String::from(pit),
                    generation,
                };
                (ReleaseOutcome::Freed { generation }, alloc::vec![event])
            }
            PitState::Allocated => {
                if record.generation != expected_generation {
                    return (
                        ReleaseOutcome::StaleGeneration {
                            expected: expected_generation,
                            current: record.generation,
                        },
                        Vec::new(),
                    );
                }
                record.state = PitState::Free;
                record.binding = None;
                let event = TableEvent::Freed {
                    pit: String::from(pit),
                    generation: expected_generation,
                };
                (
                    ReleaseOutcome::Freed {
                        generation: expected_generation,
                    },
                    alloc::vec![event],
                )
            }
        }
    }

    /// Snapshot one pit's record. Always a copy, never a live reference.
    pub fn lookup(&self, pit: &str) -> Option<AllocationRecord> {
        self.records.get(pit).cloned()
    }

    /// Reconcile the table against what the OS reports live.
    ///
    /// Pits not in `live` are forced FREE. Live pits the table reads FREE
    /// are rebound from `durable` when a usable record exists; with no
    /// record, or a record older than the pit's own generation, they are
    /// quarantined instead. Live pits already allocated or quarantined are
    /// left alone.
    pub fn reconcile(
        &mut self,
        live: &BTreeSet<String>,
        durable: &BTreeMap<String, BindRecord>,
    ) -> (ReconcileReport, Vec<TableEvent>) {
        let mut report = ReconcileReport::default();
        let mut events = Vec::new();

        for (name, record) in self.records.iter_mut() {
            if !live.contains(name) {
                if record.state != PitState::Free {
                    record.state = PitState::Free;
                    record.binding = None;
                    events.push(TableEvent::ForceFreed { pit: name.clone() });
                    report.force_freed.push(name.clone());
                }
                continue;
            }
            if record.state != PitState::Free {
                continue;
            }
            match durable.get(name) {
                Some(saved) if saved.generation >= record.generation => {
                    // A restored binding keeps its saved generation so a
                    // release issued before the restart still matches. The
                    // record does not carry the process; it reverts to auto.
                    let binding = Binding {
                        plugin: saved.plugin.clone(),
                        screen: saved.screen.clone(),
                        process: ProcessSelector::Auto,
                    };
                    record.state = PitState::Allocated;
                    record.generation = saved.generation;
                    record.stamp = saved.stamp;
                    record.binding = Some(binding.clone());
                    events.push(TableEvent::Restored {
                        pit: name.clone(),
                        binding,
                        generation: saved.generation,
                        stamp: saved.stamp,
                    });
                    report.restored.push(name.clone());
                }
                _ => {
                    record.state = PitState::AllocatedUnknown;
                    record.binding = None;
                    events.push(TableEvent::Quarantined { pit: name.clone() });
                    report.quarantined.push(name.clone());
                }
            }
        }

        (report, events)
    }

    /// Copy the whole table
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            records: self.records.clone(),
        }
    }

    /// Apply one event to this table.
    ///
    /// This is the replica side of every mutation above: applying the events
    /// a mutation emitted, in order, to an equal starting table produces an
    /// equal ending table. A pit the table has never seen gets a default
    /// record first, so replicas stay faithful even across catalog skew;
    /// invariant checks flag the skew separately.
    pub fn apply_event(&mut self, event: &TableEvent) {
        match event {
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
                let record = self.records.entry(pit.clone()).or_default();
                record.state = PitState::Allocated;
                record.binding = Some(binding.clone());
                record.generation = *generation;
                record.stamp = *stamp;
            }
            TableEvent::Freed { pit, generation } => {
                let record = self.records.entry(pit.clone()).or_default();
                record.state = PitState::Free;
                record.binding = None;
                record.generation = *generation;
            }
            TableEvent::ForceFreed { pit } => {
                let record = self.records.entry(pit.clone()).or_default();
                record.state = PitState::Free;
                record.binding = None;
            }
            TableEvent::Quarantined { pit } => {
                let record = self.records.entry(pit.clone()).or_default();
                record.state = PitState::AllocatedUnknown;
                record.binding = None;
            }
        }
    }

    /// FREE pits remaining in one sub-pool
    pub fn free_in(&self, catalog: &PitCatalog, key: SubPoolKey) -> usize {
        catalog
            .sub_pool(key)
            .filter(|p| {
                self.records
                    .get(&p.name)
                    .map(|r| r.state == PitState::Free)
                    .unwrap_or(false)
            })
            .count()
    }

    /// Pits currently allocated, across all sub-pools
    pub fn allocated_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.state == PitState::Allocated)
            .count()
    }
}
