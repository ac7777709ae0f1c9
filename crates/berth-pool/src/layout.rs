//! Static pool layout configuration
//!
//! The layout is the compiled-in shape of the pit pool: how many affinity
//! groups exist and how many pits each (behavior, translucency) pair gets
//! per group. It must match the component registry the host application was
//! installed with; a mismatch is a deployment defect, not something this
//! crate can repair at run time.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::types::LaunchBehavior;

/// Upper bound on affinity groups a layout may declare
pub const MAX_GROUPS: u16 = 32;

/// Pool shape: groups, name stem and the per-group capacity table.
///
/// Counts are indexed in [`LaunchBehavior::ALL`] order
/// (Standard, SingleTop, SingleTask, SingleInstance) and apply identically
/// to every group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLayout {
    /// Number of affinity groups including the default task (group 0)
    pub groups: u16,
    /// Leading segment of every pit name
    pub stem: String,
    /// Pits per behavior for opaque themes
    pub opaque_counts: [u8; 4],
    /// Pits per behavior for translucent themes
    pub translucent_counts: [u8; 4],
    /// Substrings that mark a declared theme name as translucent
    pub translucent_markers: Vec<String>,
}

impl Default for PoolLayout {
    fn default() -> Self {
        Self {
            groups: 3,
            stem: String::from("PitN1"),
            opaque_counts: [6, 2, 3, 2],
            translucent_counts: [2, 2, 2, 3],
            translucent_markers: alloc::vec![
                String::from("Translucent"),
                String::from("Dialog"),
            ],
        }
    }
}

impl PoolLayout {
    /// Pits one group holds for a (behavior, translucency) pair
    pub fn capacity_for(&self, behavior: LaunchBehavior, translucent: bool) -> u8 {
        let counts = if translucent {
            &self.translucent_counts
        } else {
            &self.opaque_counts
        };
        counts[Self::idx(behavior)]
    }

    /// Total pits across all groups
    pub fn total_pits(&self) -> usize {
        let per_group: usize = self
            .opaque_counts
            .iter()
            .chain(self.translucent_counts.iter())
            .map(|&c| c as usize)
            .sum();
        self.groups as usize * per_group
    }

    /// Check the layout is usable. Called by catalog construction.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.groups == 0 {
            return Err(PoolError::InvalidLayout {
                reason: "layout declares zero affinity groups",
            });
        }
        if self.groups > MAX_GROUPS {
            return Err(PoolError::InvalidLayout {
                reason: "layout declares too many affinity groups",
            });
        }
        if self.stem.is_empty() {
            return Err(PoolError::InvalidLayout {
                reason: "pit name stem is empty",
            });
        }
        if self.total_pits() == 0 {
            return Err(PoolError::InvalidLayout {
                reason: "capacity table is all zero",
            });
        }
        Ok(())
    }

    fn idx(behavior: LaunchBehavior) -> usize {
        match behavior {
            LaunchBehavior::Standard => 0,
            LaunchBehavior::SingleTop => 1,
            LaunchBehavior::SingleTask => 2,
            LaunchBehavior::SingleInstance => 3,
        }
    }
}
