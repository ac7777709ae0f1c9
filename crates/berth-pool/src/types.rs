//! Core pool types
//!
//! This module contains the fundamental types shared by the classifier, the
//! catalog and the allocation table. All types here are pure data - no I/O,
//! no clocks, no locks.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use berth_directive::ProcessSelector;
use serde::{Deserialize, Serialize};

/// How the host OS treats repeated launches of the same screen.
///
/// This is a static attribute of a pit: a screen may only be routed through a
/// pit declared with the behavior the screen asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LaunchBehavior {
    /// Every launch creates a fresh instance
    Standard,
    /// Reuse the instance when it is already on top
    SingleTop,
    /// Reuse the single instance inside its task
    SingleTask,
    /// Reuse the single instance in its own dedicated task
    SingleInstance,
}

impl LaunchBehavior {
    /// All behaviors in capacity-table order
    pub const ALL: [LaunchBehavior; 4] = [
        LaunchBehavior::Standard,
        LaunchBehavior::SingleTop,
        LaunchBehavior::SingleTask,
        LaunchBehavior::SingleInstance,
    ];

    /// Short infix used in pit names
    pub fn infix(&self) -> &'static str {
        match self {
            LaunchBehavior::Standard => "NR",
            LaunchBehavior::SingleTop => "STP",
            LaunchBehavior::SingleTask => "ST",
            LaunchBehavior::SingleInstance => "SI",
        }
    }

    /// Whether a repeat launch of the same (plugin, screen) should reuse an
    /// existing allocation instead of taking a fresh pit
    pub fn reuses_existing(&self) -> bool {
        !matches!(self, LaunchBehavior::Standard)
    }
}

impl fmt::Display for LaunchBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaunchBehavior::Standard => "Standard",
            LaunchBehavior::SingleTop => "SingleTop",
            LaunchBehavior::SingleTask => "SingleTask",
            LaunchBehavior::SingleInstance => "SingleInstance",
        };
        write!(f, "{}", name)
    }
}

/// Identity of one sub-pool: the (group, behavior, translucency) tuple.
///
/// Every pit belongs to exactly one sub-pool and never moves.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SubPoolKey {
    /// Affinity group; 0 is the default task
    pub group: u16,
    /// Launch behavior
    pub behavior: LaunchBehavior,
    /// Translucent theme pool
    pub translucent: bool,
}

impl fmt::Display for SubPoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "g{}:{}:{}",
            self.group,
            self.behavior.infix(),
            if self.translucent { "TS" } else { "NTS" }
        )
    }
}

/// Allocation state of one pit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PitState {
    /// Unclaimed, available to allocate
    Free,
    /// Bound to a plugin screen
    Allocated,
    /// Reported live by the OS but owned by nothing we can confirm.
    /// Excluded from allocation until released or force-freed.
    AllocatedUnknown,
}

impl Default for PitState {
    fn default() -> Self {
        PitState::Free
    }
}

/// The plugin screen bound to an allocated pit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Plugin name
    pub plugin: String,
    /// Screen (component) name inside the plugin
    pub screen: String,
    /// Process the screen asked to run in
    pub process: ProcessSelector,
}

impl Binding {
    /// Build a binding
    pub fn new(plugin: &str, screen: &str, process: ProcessSelector) -> Self {
        Self {
            plugin: String::from(plugin),
            screen: String::from(screen),
            process,
        }
    }

    /// Same (plugin, screen) pair, process ignored
    pub fn matches(&self, plugin: &str, screen: &str) -> bool {
        self.plugin == plugin && self.screen == screen
    }
}

/// Current state of one pit as held by the allocation table.
///
/// `binding` is `Some` exactly when `state` is [`PitState::Allocated`].
/// `generation` only ever grows; it is bumped on every fresh allocation and
/// quoted back on release so a stale release can be told apart from a
/// current one. `stamp` records when the binding was made (milliseconds).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// Current state
    pub state: PitState,
    /// Bound screen, present iff allocated
    pub binding: Option<Binding>,
    /// Monotonic per-pit generation counter
    pub generation: u64,
    /// Time the current binding was made (ms); stale once freed
    pub stamp: u64,
}

impl AllocationRecord {
    /// Pit is available to allocate
    pub fn is_free(&self) -> bool {
        self.state == PitState::Free
    }

    /// Pit is bound to a confirmed screen
    pub fn is_allocated(&self) -> bool {
        self.state == PitState::Allocated
    }

    /// Pit is quarantined
    pub fn is_quarantined(&self) -> bool {
        self.state == PitState::AllocatedUnknown
    }
}

/// Durable text form of one binding, written by the store so allocations
/// survive a process restart.
///
/// Rendered as `plugin:screen:generation:stamp` with decimal integers.
/// Names containing `:` cannot be represented; `parse` rejects any text
/// that does not split into exactly four fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindRecord {
    /// Plugin name
    pub plugin: String,
    /// Screen name
    pub screen: String,
    /// Generation the binding held when saved
    pub generation: u64,
    /// Time the binding was made (ms)
    pub stamp: u64,
}

impl BindRecord {
    /// Render to the durable text form
    pub fn render(&self) -> String {
        alloc::format!(
            "{}:{}:{}:{}",
            self.plugin,
            self.screen,
            self.generation,
            self.stamp
        )
    }

    /// Parse the durable text form. Returns `None` for anything malformed;
    /// callers skip such records rather than failing.
    pub fn parse(text: &str) -> Option<BindRecord> {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 4 {
            return None;
        }
        if parts[0].is_empty() || parts[1].is_empty() {
            return None;
        }
        let generation = parts[2].parse().ok()?;
        let stamp = parts[3].parse().ok()?;
        Some(BindRecord {
            plugin: String::from(parts[0]),
            screen: String::from(parts[1]),
            generation,
            stamp,
        })
    }
}
