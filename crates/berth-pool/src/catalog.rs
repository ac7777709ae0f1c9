//! Pit catalog - the fixed roster of placeholder identities
//!
//! Built exactly once from a [`PoolLayout`] and read-only afterwards. Every
//! OS process that loads this crate with the same layout derives the same
//! catalog, so pit names can cross process boundaries without negotiation.
//!
//! # Name grammar
//!
//! `{stem}{TA<g-1> when group > 0}{NR|STP|ST|SI}{TS|NTS}{index}`
//!
//! | Name | Group | Behavior | Theme | Index |
//! |------|-------|----------|-------|-------|
//! | `PitN1NRNTS0` | 0 | Standard | opaque | 0 |
//! | `PitN1TA0STTS1` | 1 | SingleTask | translucent | 1 |
//! | `PitN1TA1SITS2` | 2 | SingleInstance | translucent | 2 |
//!
//! Group 0 is the default task and carries no `TA` segment.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::layout::PoolLayout;
use crate::types::{LaunchBehavior, SubPoolKey};

/// One placeholder declaration: identity plus its fixed attributes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pit {
    /// Stable unique name, identical across processes
    pub name: String,
    /// Affinity group
    pub group: u16,
    /// Launch behavior
    pub behavior: LaunchBehavior,
    /// Translucent theme pool
    pub translucent: bool,
    /// Position within the sub-pool, 0-based
    pub capacity_index: u8,
}

impl Pit {
    /// The sub-pool this pit belongs to
    pub fn key(&self) -> SubPoolKey {
        SubPoolKey {
            group: self.group,
            behavior: self.behavior,
            translucent: self.translucent,
        }
    }
}

/// Render a pit name from its attributes
pub fn pit_name(
    stem: &str,
    group: u16,
    behavior: LaunchBehavior,
    translucent: bool,
    index: u8,
) -> String {
    let theme = if translucent { "TS" } else { "NTS" };
    if group == 0 {
        alloc::format!("{}{}{}{}", stem, behavior.infix(), theme, index)
    } else {
        alloc::format!(
            "{}TA{}{}{}{}",
            stem,
            group - 1,
            behavior.infix(),
            theme,
            index
        )
    }
}

/// The complete pit roster, indexed by name and by sub-pool
pub struct PitCatalog {
    layout: PoolLayout,
    pits: Vec<Pit>,
    by_name: BTreeMap<String, usize>,
    sub_pools: BTreeMap<SubPoolKey, Vec<usize>>,
}

impl PitCatalog {
    /// Build the catalog. Fails fast on an unusable layout.
    pub fn new(layout: PoolLayout) -> Result<Self, PoolError> {
        layout.validate()?;

        let mut pits = Vec::with_capacity(layout.total_pits());
        let mut by_name = BTreeMap::new();
        let mut sub_pools: BTreeMap<SubPoolKey, Vec<usize>> = BTreeMap::new();

        for group in 0..layout.groups {
            for behavior in LaunchBehavior::ALL {
                for translucent in [false, true] {
                    let count = layout.capacity_for(behavior, translucent);
                    for index in 0..count {
                        let name = pit_name(&layout.stem, group, behavior, translucent, index);
                        let pit = Pit {
                            name: name.clone(),
                            group,
                            behavior,
                            translucent,
                            capacity_index: index,
                        };
                        let slot = pits.len();
                        if by_name.insert(name, slot).is_some() {
                            return Err(PoolError::InvalidLayout {
                                reason: "duplicate pit name",
                            });
                        }
                        sub_pools.entry(pit.key()).or_default().push(slot);
                        pits.push(pit);
                    }
                }
            }
        }

        Ok(Self {
            layout,
            pits,
            by_name,
            sub_pools,
        })
    }

    /// Build the catalog from the default layout
    pub fn with_defaults() -> Result<Self, PoolError> {
        Self::new(PoolLayout::default())
    }

    /// The layout this catalog was built from
    pub fn layout(&self) -> &PoolLayout {
        &self.layout
    }

    /// Total number of pits
    pub fn len(&self) -> usize {
        self.pits.len()
    }

    /// True when the catalog holds no pits (never, given validation)
    pub fn is_empty(&self) -> bool {
        self.pits.is_empty()
    }

    /// All pits in declaration order
    pub fn pits(&self) -> &[Pit] {
        &self.pits
    }

    /// Look a pit up by its name
    pub fn find_by_name(&self, name: &str) -> Option<&Pit> {
        self.by_name.get(name).map(|&i| &self.pits[i])
    }

    /// Pits of one sub-pool in ascending capacity-index order
    pub fn sub_pool(&self, key: SubPoolKey) -> impl Iterator<Item = &Pit> {
        self.sub_pools
            .get(&key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.pits[i])
    }

    /// Capacity of one sub-pool; 0 for tuples the layout does not provision
    pub fn capacity_of(&self, key: SubPoolKey) -> usize {
        self.sub_pools.get(&key).map(|v| v.len()).unwrap_or(0)
    }

    /// All provisioned sub-pool keys
    pub fn sub_pool_keys(&self) -> impl Iterator<Item = SubPoolKey> + '_ {
        self.sub_pools.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Name grammar tests
    // ========================================================================

    #[test]
    fn test_pit_name_default_task_has_no_ta_segment() {
        assert_eq!(
            pit_name("PitN1", 0, LaunchBehavior::Standard, false, 0),
            "PitN1NRNTS0"
        );
        assert_eq!(
            pit_name("PitN1", 0, LaunchBehavior::SingleInstance, true, 2),
            "PitN1SITS2"
        );
    }

    #[test]
    fn test_pit_name_affinity_groups_start_at_ta0() {
        assert_eq!(
            pit_name("PitN1", 1, LaunchBehavior::SingleTask, true, 1),
            "PitN1TA0STTS1"
        );
        assert_eq!(
            pit_name("PitN1", 2, LaunchBehavior::SingleTop, false, 0),
            "PitN1TA1STPNTS0"
        );
    }

    // ========================================================================
    // Catalog construction tests
    // ========================================================================

    #[test]
    fn test_default_catalog_size() {
        let catalog = PitCatalog::with_defaults().unwrap();
        assert_eq!(catalog.len(), 66);
        assert!(!catalog.is_empty());
    }

    #[test]
    fn test_all_names_unique() {
        let catalog = PitCatalog::with_defaults().unwrap();
        for pit in catalog.pits() {
            assert_eq!(
                catalog.find_by_name(&pit.name).map(|p| &p.name),
                Some(&pit.name)
            );
        }
        assert_eq!(catalog.by_name.len(), catalog.len());
    }

    #[test]
    fn test_find_by_name_resolves_attributes() {
        let catalog = PitCatalog::with_defaults().unwrap();

        let pit = catalog.find_by_name("PitN1NRNTS0").unwrap();
        assert_eq!(pit.group, 0);
        assert_eq!(pit.behavior, LaunchBehavior::Standard);
        assert!(!pit.translucent);
        assert_eq!(pit.capacity_index, 0);

        let pit = catalog.find_by_name("PitN1TA0STTS1").unwrap();
        assert_eq!(pit.group, 1);
        assert_eq!(pit.behavior, LaunchBehavior::SingleTask);
        assert!(pit.translucent);
        assert_eq!(pit.capacity_index, 1);

        let pit = catalog.find_by_name("PitN1TA1SITS2").unwrap();
        assert_eq!(pit.group, 2);
        assert_eq!(pit.behavior, LaunchBehavior::SingleInstance);
        assert!(pit.translucent);
        assert_eq!(pit.capacity_index, 2);
    }

    #[test]
    fn test_find_by_name_unknown() {
        let catalog = PitCatalog::with_defaults().unwrap();
        assert!(catalog.find_by_name("NoSuchPit").is_none());
        assert!(catalog.find_by_name("").is_none());
    }

    #[test]
    fn test_sub_pool_ordered_by_capacity_index() {
        let catalog = PitCatalog::with_defaults().unwrap();
        let key = SubPoolKey {
            group: 1,
            behavior: LaunchBehavior::Standard,
            translucent: false,
        };
        let indices: Vec<u8> = catalog.sub_pool(key).map(|p| p.capacity_index).collect();
        assert_eq!(indices, [0, 1, 2, 3, 4, 5]);
        for pit in catalog.sub_pool(key) {
            assert_eq!(pit.key(), key);
        }
    }

    #[test]
    fn test_capacity_of_matches_layout() {
        let catalog = PitCatalog::with_defaults().unwrap();
        for group in 0..3 {
            for behavior in LaunchBehavior::ALL {
                for translucent in [false, true] {
                    let key = SubPoolKey {
                        group,
                        behavior,
                        translucent,
                    };
                    let expected = catalog.layout().capacity_for(behavior, translucent) as usize;
                    assert_eq!(catalog.capacity_of(key), expected, "key {}", key);
                }
            }
        }
    }

    #[test]
    fn test_capacity_of_unprovisioned_tuples_is_zero() {
        let catalog = PitCatalog::with_defaults().unwrap();
        // Group beyond the layout
        let key = SubPoolKey {
            group: 9,
            behavior: LaunchBehavior::Standard,
            translucent: false,
        };
        assert_eq!(catalog.capacity_of(key), 0);
        assert_eq!(catalog.sub_pool(key).count(), 0);
    }

    #[test]
    fn test_zero_count_sub_pool_is_empty() {
        let layout = PoolLayout {
            translucent_counts: [0, 0, 0, 0],
            ..PoolLayout::default()
        };
        let catalog = PitCatalog::new(layout).unwrap();
        let key = SubPoolKey {
            group: 0,
            behavior: LaunchBehavior::Standard,
            translucent: true,
        };
        assert_eq!(catalog.capacity_of(key), 0);
    }

    #[test]
    fn test_new_rejects_invalid_layout() {
        let layout = PoolLayout {
            groups: 0,
            ..PoolLayout::default()
        };
        assert!(PitCatalog::new(layout).is_err());
    }

    #[test]
    fn test_sub_pool_keys_cover_all_nonzero_tuples() {
        let catalog = PitCatalog::with_defaults().unwrap();
        // 3 groups x 4 behaviors x 2 themes, all nonzero in the default layout
        assert_eq!(catalog.sub_pool_keys().count(), 24);
    }
}
