//! Size estimation and statistics shared by every cache

use crate::cache::entry::CacheMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Computes the approximate size in bytes of one cached key/value pair.
pub type Weigher<K, V> = Arc<dyn Fn(&K, &V) -> usize + Send + Sync>;

/// Default weigher: the inline size of key, value and entry metadata.
///
/// Handles are usually small references into host memory, so their inline
/// size is a fair approximation. Caches holding owned payloads should supply
/// their own weigher.
pub fn inline_size<K, V>(_key: &K, _value: &V) -> usize {
    std::mem::size_of::<K>() + std::mem::size_of::<V>() + std::mem::size_of::<CacheMetadata>()
}

/// Read-only snapshot of a cache's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Lookups answered from a live entry
    pub hits: u64,

    /// Lookups that found nothing live (absent or expired)
    pub misses: u64,

    /// Live or not-yet-swept entries held right now
    pub entries: usize,

    /// Approximate total size of cached data in bytes
    pub size_bytes: usize,

    /// Number of evictions due to entry-count or size limits
    pub evictions_size: u64,

    /// Entries dropped because their TTL elapsed or they sat idle too long
    pub evictions_ttl: u64,

    /// Number of entries removed by `invalidate` or `clear`
    pub invalidations: u64,
}

impl CacheStats {
    /// hits / (hits + misses), or 0.0 before any access
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total lookups served
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// Entries dropped by the cache itself rather than by a caller
    pub fn total_evictions(&self) -> u64 {
        self.evictions_size + self.evictions_ttl
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.1}%, entries: {}, size: {} bytes, evictions: {} }}",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.entries,
            self.size_bytes,
            self.total_evictions()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_is_a_fraction() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };

        assert_eq!(stats.hit_rate(), 0.8);
        assert_eq!(stats.accesses(), 100);
    }

    #[test]
    fn test_hit_rate_before_any_access() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_display_summarizes_counters() {
        let stats = CacheStats {
            hits: 2,
            misses: 1,
            entries: 4,
            size_bytes: 512,
            evictions_size: 6,
            evictions_ttl: 1,
            invalidations: 9,
        };

        let line = stats.to_string();
        assert!(line.contains("hits: 2"));
        assert!(line.contains("misses: 1"));
        assert!(line.contains("hit_rate: 66.7%"));
        assert!(line.contains("evictions: 7"));
    }

    #[test]
    fn test_inline_size() {
        let size = inline_size(&0u64, &0u32);
        assert_eq!(size, 8 + 4 + std::mem::size_of::<CacheMetadata>());
    }
}
