//! Why entries leave a cache
//!
//! Every removal path in the store is tagged with one of these reasons so the
//! statistics and the debug log agree on what happened to an entry.

use serde::{Deserialize, Serialize};

/// Reason an entry was removed from a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Entry reached its TTL and was found by a lookup or a purge
    Expired,

    /// Explicit `invalidate(key)`
    Manual,

    /// Evicted to respect the entry-count or size bound
    LeastRecentlyUsed,

    /// Removed by `clear()`, typically from a lifecycle hook
    Cleared,

    /// Not accessed for longer than the `purge_idle` threshold
    Idle,

    /// Replaced by a newer value for the same key
    Replaced,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "TTL expired"),
            InvalidationReason::Manual => write!(f, "manual invalidation"),
            InvalidationReason::LeastRecentlyUsed => write!(f, "LRU eviction"),
            InvalidationReason::Cleared => write!(f, "cache cleared"),
            InvalidationReason::Idle => write!(f, "idle too long"),
            InvalidationReason::Replaced => write!(f, "value replaced"),
        }
    }
}
