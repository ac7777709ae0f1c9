//! Berth Sync - Coordinator Runtime and Cross-Process Mirror
//!
//! This crate wraps the pure state machine in `berth-pool` with everything a
//! running host needs: one coordinator that owns the authoritative table, a
//! durable store so bindings survive coordinator restarts, a hash-chained
//! commit journal, and the client-side mirror that routes launches from
//! satellite processes.
//!
//! # Design Principles
//!
//! 1. **One authority**: the coordinator's table is the truth; mirrors are
//!    caches and never mutate
//! 2. **Effects in order**: store, then journal, then hooks, all under one
//!    lock per mutation
//! 3. **Degrade, don't block**: an unreachable coordinator reads as pool
//!    exhaustion, a corrupt store as an empty one
//! 4. **Recover on evidence**: the table is rebuilt on the first reconcile,
//!    once the host can say which pits are actually live
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │      coordinator process      │
//! │                               │
//! │  Coordinator ──▶ PitTable     │
//! │       │                       │
//! │       ├──▶ BindStore (disk)   │
//! │       └──▶ BindJournal        │
//! │                │ commits      │
//! └───┬────────────┼──────────────┘
//!     │ link       │ snapshots
//! ┌───▼────────────▼──────────────┐
//! │      satellite processes      │
//! │  TableMirror ──▶ local cache  │
//! └───────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `clock` - Time source abstraction
//! - `store` - Durable bind records (memory and JSON file backed)
//! - `journal` - Hash-chained commit journal and replay
//! - `coordinator` - The single authority over the table
//! - `link` - The operation surface a transport must carry
//! - `mirror` - Client-side replica and launch routing

pub mod clock;
pub mod coordinator;
pub mod journal;
pub mod link;
pub mod mirror;
pub mod store;

// Re-export all public types for convenient access
pub use clock::{Clock, SystemClock};
pub use coordinator::{CommitHook, Coordinator};
pub use journal::{
    commit_hash, replay, replay_verified, BindCommit, BindJournal, ReplayError, MAX_COMMITS,
};
pub use link::{CoordinatorLink, LinkError, LocalLink, SyncSnapshot};
pub use mirror::{LaunchOutcome, LaunchRequest, TableMirror};
pub use store::{BindStore, JsonFileBindStore, MemoryBindStore, StoreError};
