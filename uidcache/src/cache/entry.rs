//! Cache entry management with TTL support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cached value with its bookkeeping. Owned by the cache; consumers only
/// ever see clones of `value`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl<V> CacheEntry<V> {
    /// Create a new entry. `ttl` of `None` never expires.
    pub fn new(value: V, ttl: Option<Duration>, size_bytes: usize) -> Self {
        Self::created_at(value, ttl, size_bytes, Utc::now())
    }

    pub(crate) fn created_at(
        value: V,
        ttl: Option<Duration>,
        size_bytes: usize,
        now: DateTime<Utc>,
    ) -> Self {
        // A TTL too large for chrono is as good as no TTL at all.
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));

        Self {
            value,
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                expires_at,
                hit_count: 0,
                size_bytes,
                access_tick: 0,
            },
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// An entry is expired from the instant `created_at + ttl` is reached.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.metadata.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Record a hit: refresh access time, bump the hit count and LRU tick
    pub fn mark_accessed(&mut self, tick: u64) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.hit_count += 1;
        self.metadata.access_tick = tick;
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last access time
    pub accessed_at: DateTime<Utc>,

    /// When the entry expires, `None` for no expiry
    pub expires_at: Option<DateTime<Utc>>,

    /// Number of hits served from this entry
    pub hit_count: u64,

    /// Approximate size of the entry in bytes
    pub size_bytes: usize,

    /// Position in the cache's access order; lower is older.
    /// Also breaks ties between equal access timestamps by insertion order.
    pub access_tick: u64,
}

impl CacheMetadata {
    /// Check if entry has not been accessed for longer than `threshold`
    pub fn is_stale(&self, threshold: Duration) -> bool {
        let idle = (Utc::now() - self.accessed_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        idle > threshold
    }
}
