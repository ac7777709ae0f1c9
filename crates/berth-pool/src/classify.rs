//! Pool classifier - (affinity key, behavior, translucency) to sub-pool
//!
//! Classification must be deterministic and stable across process restarts,
//! because every OS process derives its own copy of the mapping and the pit
//! names embedded in durable records must keep meaning the same sub-pool.
//! Affinity keys are therefore hashed, not registered first-come-first-served.

use alloc::string::String;

use crate::catalog::PitCatalog;
use crate::error::PoolError;
use crate::types::{LaunchBehavior, SubPoolKey};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Map an affinity key onto a group.
///
/// No key, a blank key, or a layout with a single group all land on group 0
/// (the default task). Everything else hashes onto groups `1..groups`.
/// Never fails: an unrecognizable key is still a valid default-task request.
pub fn affinity_group(groups: u16, affinity: Option<&str>) -> u16 {
    let key = match affinity {
        Some(k) => k.trim(),
        None => return 0,
    };
    if key.is_empty() || groups <= 1 {
        return 0;
    }
    let spread = (groups - 1) as u64;
    1 + (fnv1a(key.as_bytes()) % spread) as u16
}

/// Decide translucency from a declared theme name.
///
/// A theme is translucent when it contains any of the layout's marker
/// substrings.
pub fn is_translucent_theme(markers: &[String], theme: &str) -> bool {
    markers
        .iter()
        // an empty marker would match every theme
        .any(|m| !m.is_empty() && theme.contains(m.as_str()))
}

/// Classify a launch request onto its sub-pool.
///
/// Fails only when the resolved tuple has zero capacity in this catalog.
pub fn classify(
    catalog: &PitCatalog,
    affinity: Option<&str>,
    behavior: LaunchBehavior,
    translucent: bool,
) -> Result<SubPoolKey, PoolError> {
    let group = affinity_group(catalog.layout().groups, affinity);
    let key = SubPoolKey {
        group,
        behavior,
        translucent,
    };
    if catalog.capacity_of(key) == 0 {
        return Err(PoolError::NoEligiblePool {
            group,
            behavior,
            translucent,
        });
    }
    Ok(key)
}

/// Classify with translucency resolved from a theme name
pub fn classify_theme(
    catalog: &PitCatalog,
    affinity: Option<&str>,
    behavior: LaunchBehavior,
    theme: &str,
) -> Result<SubPoolKey, PoolError> {
    let translucent = is_translucent_theme(&catalog.layout().translucent_markers, theme);
    classify(catalog, affinity, behavior, translucent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PoolLayout;
    use alloc::vec::Vec;

    // ========================================================================
    // affinity_group tests
    // ========================================================================

    #[test]
    fn test_no_key_is_default_task() {
        assert_eq!(affinity_group(3, None), 0);
    }

    #[test]
    fn test_blank_key_is_default_task() {
        assert_eq!(affinity_group(3, Some("")), 0);
        assert_eq!(affinity_group(3, Some("   ")), 0);
        assert_eq!(affinity_group(3, Some("\t\n")), 0);
    }

    #[test]
    fn test_single_group_layout_always_default_task() {
        assert_eq!(affinity_group(1, Some("com.example.task")), 0);
        assert_eq!(affinity_group(1, None), 0);
    }

    #[test]
    fn test_named_key_never_lands_on_default_task() {
        for key in ["a", "com.example.one", "com.example.two", "x.y.z"] {
            let group = affinity_group(3, Some(key));
            assert!(group >= 1 && group <= 2, "key {:?} -> group {}", key, group);
        }
    }

    #[test]
    fn test_classification_is_deterministic() {
        for key in ["com.example.task", "shop.checkout", "n"] {
            let first = affinity_group(5, Some(key));
            for _ in 0..10 {
                assert_eq!(affinity_group(5, Some(key)), first);
            }
        }
    }

    #[test]
    fn test_two_group_layout_maps_every_key_to_group_one() {
        // spread of 1: hash % 1 == 0 for any hash
        assert_eq!(affinity_group(2, Some("anything")), 1);
        assert_eq!(affinity_group(2, Some("else")), 1);
    }

    #[test]
    fn test_key_is_trimmed_before_hashing() {
        let bare = affinity_group(5, Some("com.example.task"));
        let padded = affinity_group(5, Some("  com.example.task  "));
        assert_eq!(bare, padded);
    }

    // ========================================================================
    // is_translucent_theme tests
    // ========================================================================

    fn default_markers() -> Vec<String> {
        PoolLayout::default().translucent_markers
    }

    #[test]
    fn test_translucent_markers_match() {
        let markers = default_markers();
        assert!(is_translucent_theme(&markers, "Theme.Translucent"));
        assert!(is_translucent_theme(&markers, "Theme.Translucent.NoTitleBar"));
        assert!(is_translucent_theme(
            &markers,
            "Theme.Translucent.NoTitleBar.Fullscreen"
        ));
        assert!(is_translucent_theme(&markers, "Theme.Holo.Dialog"));
    }

    #[test]
    fn test_opaque_themes_do_not_match() {
        let markers = default_markers();
        assert!(!is_translucent_theme(&markers, "Theme.Light"));
        assert!(!is_translucent_theme(&markers, "Theme.Black.NoTitleBar"));
        assert!(!is_translucent_theme(&markers, ""));
    }

    #[test]
    fn test_no_markers_means_nothing_translucent() {
        assert!(!is_translucent_theme(&[], "Theme.Translucent"));
    }

    #[test]
    fn test_empty_marker_is_ignored() {
        let markers = alloc::vec![String::new()];
        assert!(!is_translucent_theme(&markers, "Theme.Light"));
    }

    // ========================================================================
    // classify tests
    // ========================================================================

    #[test]
    fn test_classify_default_task_standard() {
        let catalog = PitCatalog::with_defaults().unwrap();
        let key = classify(&catalog, None, LaunchBehavior::Standard, false).unwrap();
        assert_eq!(key.group, 0);
        assert_eq!(key.behavior, LaunchBehavior::Standard);
        assert!(!key.translucent);
    }

    #[test]
    fn test_classify_zero_capacity_fails() {
        let layout = PoolLayout {
            translucent_counts: [0, 0, 0, 0],
            ..PoolLayout::default()
        };
        let catalog = PitCatalog::new(layout).unwrap();
        let err = classify(&catalog, None, LaunchBehavior::Standard, true).unwrap_err();
        assert_eq!(
            err,
            PoolError::NoEligiblePool {
                group: 0,
                behavior: LaunchBehavior::Standard,
                translucent: true,
            }
        );
    }

    #[test]
    fn test_classify_matches_affinity_group() {
        let catalog = PitCatalog::with_defaults().unwrap();
        let affinity = Some("com.example.task");
        let key = classify(&catalog, affinity, LaunchBehavior::SingleTop, false).unwrap();
        assert_eq!(key.group, affinity_group(3, affinity));
        assert!(key.group >= 1);
    }

    #[test]
    fn test_classify_theme_resolves_translucency() {
        let catalog = PitCatalog::with_defaults().unwrap();
        let key = classify_theme(
            &catalog,
            None,
            LaunchBehavior::Standard,
            "Theme.Translucent.NoTitleBar",
        )
        .unwrap();
        assert!(key.translucent);

        let key =
            classify_theme(&catalog, None, LaunchBehavior::Standard, "Theme.Light").unwrap();
        assert!(!key.translucent);
    }
}
