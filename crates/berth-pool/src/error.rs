//! Error Types for the Pool Core
//!
//! Every fallible path in this crate reports one of these values. Exhaustion
//! and stale releases are NOT errors - they are ordinary outcomes modeled in
//! `table` - so the variants here cover only classification failures and
//! invalid static configuration.

use core::fmt;

use crate::types::LaunchBehavior;

/// Errors raised by catalog construction and classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// The requested (group, behavior, translucency) tuple has zero capacity
    NoEligiblePool {
        group: u16,
        behavior: LaunchBehavior,
        translucent: bool,
    },

    /// Static layout configuration is unusable
    InvalidLayout { reason: &'static str },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::NoEligiblePool {
                group,
                behavior,
                translucent,
            } => {
                write!(
                    f,
                    "no eligible sub-pool: group {} {} {}",
                    group,
                    behavior,
                    if *translucent { "translucent" } else { "opaque" }
                )
            }
            PoolError::InvalidLayout { reason } => {
                write!(f, "invalid pool layout: {}", reason)
            }
        }
    }
}
