//! Berth Pool - Pure Pit Allocation State Machine
//!
//! This crate reconciles an open-ended, run-time-discovered set of plugin
//! screens against the closed pool of placeholder declarations ("pits") the
//! host application was installed with. It is the **pure core**: no I/O, no
//! clocks, no locks, no logging.
//!
//! # Design Principles
//!
//! 1. **No runtime dependency**: persistence, journaling and cross-process
//!    sync live in `berth-sync`
//! 2. **No side effects**: every mutation returns its outcome plus the
//!    [`TableEvent`]s describing what changed
//! 3. **Deterministic**: the same layout derives the same catalog and the
//!    same classification in every process, across restarts
//! 4. **Verifiable**: exhaustion, stale releases and quarantine are ordinary
//!    values, never panics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       berth-pool                         │
//! │                                                          │
//! │   PoolLayout ──▶ PitCatalog ──▶ classify() ──▶ SubPool   │
//! │   (static cfg)   (fixed roster)               (key)      │
//! │                                                          │
//! │   PitTable: allocate / release / lookup / reconcile      │
//! │        │                                                 │
//! │        └──▶ (outcome, Vec<TableEvent>)                   │
//! └──────────────────────────────────────────────────────────┘
//!                       │ events consumed by
//!                       ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                       berth-sync                         │
//! │   coordinator, commit journal, durable store, mirrors    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `types` - Core pool types (LaunchBehavior, SubPoolKey, records)
//! - `layout` - Static pool shape and the default capacity table
//! - `catalog` - The fixed pit roster and its name grammar
//! - `classify` - (affinity, behavior, translucency) to sub-pool
//! - `table` - The FREE/ALLOCATED state machine
//! - `invariants` - Runtime-checkable invariants for verification
//! - `error` - Error values

#![no_std]
extern crate alloc;

pub mod catalog;
pub mod classify;
pub mod error;
pub mod invariants;
pub mod layout;
pub mod table;
pub mod types;

// Re-export all public types for convenient access
pub use catalog::{pit_name, Pit, PitCatalog};
pub use classify::{affinity_group, classify, classify_theme, is_translucent_theme};
pub use error::PoolError;
pub use invariants::{assert_invariants, check_all_invariants, InvariantViolation};
pub use layout::{PoolLayout, MAX_GROUPS};
pub use table::{
    AllocateOutcome, Dedup, Grant, PitTable, ReconcileReport, ReleaseOutcome, TableEvent,
    TableSnapshot,
};
pub use types::{
    AllocationRecord, BindRecord, Binding, LaunchBehavior, PitState, SubPoolKey,
};
