//! Runtime-checkable invariants over the catalog and the table
//!
//! These should hold after every operation. They are used for:
//! 1. Runtime assertion checking during development
//! 2. Detecting catalog skew between processes after replication
//! 3. Formal verification with Kani
//!
//! # Invariants
//!
//! 1. **Record Coverage**: the table holds exactly one record per catalog pit
//! 2. **Binding Presence**: a record carries a binding iff it is ALLOCATED
//! 3. **Catalog Shape**: every pit sits in the sub-pool its attributes name,
//!    at a capacity index below that sub-pool's capacity

use alloc::string::String;
use alloc::vec::Vec;

use crate::catalog::PitCatalog;
use crate::table::PitTable;
use crate::types::PitState;

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_all_invariants(catalog: &PitCatalog, table: &PitTable) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_record_coverage(catalog, table));
    violations.extend(check_binding_presence(table));
    violations.extend(check_catalog_shape(catalog));

    violations
}

/// Invariant 1: exactly one record per catalog pit
fn check_record_coverage(catalog: &PitCatalog, table: &PitTable) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for pit in catalog.pits() {
        if !table.records.contains_key(&pit.name) {
            violations.push(InvariantViolation {
                invariant: "record_coverage",
                description: alloc::format!("pit {} has no table record", pit.name),
            });
        }
    }

    for name in table.records.keys() {
        if catalog.find_by_name(name).is_none() {
            violations.push(InvariantViolation {
                invariant: "record_coverage",
                description: alloc::format!("table record {} names no catalog pit", name),
            });
        }
    }

    violations
}

/// Invariant 2: binding present iff ALLOCATED
fn check_binding_presence(table: &PitTable) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (name, record) in &table.records {
        let expected = record.state == PitState::Allocated;
        if record.binding.is_some() != expected {
            violations.push(InvariantViolation {
                invariant: "binding_presence",
                description: alloc::format!(
                    "pit {} is {:?} but binding presence is {}",
                    name,
                    record.state,
                    record.binding.is_some()
                ),
            });
        }
    }

    violations
}

/// Invariant 3: pit attributes agree with sub-pool membership
fn check_catalog_shape(catalog: &PitCatalog) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for pit in catalog.pits() {
        let key = pit.key();
        let capacity = catalog.capacity_of(key);
        if pit.capacity_index as usize >= capacity {
            violations.push(InvariantViolation {
                invariant: "catalog_shape",
                description: alloc::format!(
                    "pit {} has capacity index {} in a sub-pool of capacity {}",
                    pit.name,
                    pit.capacity_index,
                    capacity
                ),
            });
        }
        if !catalog.sub_pool(key).any(|p| p.name == pit.name) {
            violations.push(InvariantViolation {
                invariant: "catalog_shape",
                description: alloc::format!("pit {} missing from sub-pool {}", pit.name, key),
            });
        }
    }

    violations
}

/// Assert all invariants hold (panic if not)
pub fn assert_invariants(catalog: &PitCatalog, table: &PitTable) {
    let violations = check_all_invariants(catalog, table);
    if !violations.is_empty() {
        for v in &violations {
            panic!("Invariant violated: {}", v.invariant);
        }
    }
}

// ============================================================================
// Kani proofs
// ============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;
    use crate::layout::PoolLayout;
    use crate::table::{Dedup, PitTable};
    use crate::types::{Binding, LaunchBehavior, SubPoolKey};
    use alloc::string::String;
    use berth_directive::ProcessSelector;

    fn tiny_catalog() -> PitCatalog {
        let layout = PoolLayout {
            groups: 1,
            stem: String::from("P"),
            opaque_counts: [2, 0, 0, 0],
            translucent_counts: [0, 0, 0, 0],
            translucent_markers: alloc::vec![],
        };
        PitCatalog::new(layout).unwrap()
    }

    fn only_key() -> SubPoolKey {
        SubPoolKey {
            group: 0,
            behavior: LaunchBehavior::Standard,
            translucent: false,
        }
    }

    /// Proof: allocating claims exactly one pit and keeps invariants
    #[kani::proof]
    #[kani::unwind(8)]
    fn allocate_claims_one_pit_and_maintains_invariants() {
        let catalog = tiny_catalog();
        let mut table = PitTable::new(&catalog);
        let binding = Binding::new("p", "s", ProcessSelector::Auto);

        let before = table.allocated_count();
        let (outcome, _) = table.allocate(&catalog, only_key(), binding, Dedup::Fresh, 1);

        kani::assert(outcome.grant().is_some(), "fresh table must grant");
        kani::assert(
            table.allocated_count() == before + 1,
            "exactly one pit claimed",
        );
        kani::assert(
            check_all_invariants(&catalog, &table).is_empty(),
            "allocate maintains invariants",
        );
    }

    /// Proof: a release quoting the wrong generation never frees the pit
    #[kani::proof]
    #[kani::unwind(8)]
    fn stale_release_preserves_allocation() {
        let catalog = tiny_catalog();
        let mut table = PitTable::new(&catalog);
        let binding = Binding::new("p", "s", ProcessSelector::Auto);

        let (outcome, _) = table.allocate(&catalog, only_key(), binding, Dedup::Fresh, 1);
        let grant = match outcome.grant() {
            Some(g) => g.clone(),
            None => return,
        };

        let quoted: u64 = kani::any();
        kani::assume(quoted != grant.generation);

        let (_, _) = table.release(&grant.pit, quoted);
        kani::assert(
            table.lookup(&grant.pit).unwrap().is_allocated(),
            "stale release must not free",
        );
    }
}
