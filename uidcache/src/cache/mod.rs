//! # Invalidating Cache Layer
//!
//! A generic key→value cache that memoizes expensive lookups (typically a walk
//! over a host node graph) and is force-cleared on host lifecycle signals.
//!
//! ## Features
//!
//! - **TTL expiry**: checked lazily on lookup; an entry at or past its TTL is
//!   never returned as a hit
//! - **LRU eviction**: entry-count and approximate-size bounds, oldest access
//!   evicted first, ties broken by insertion order
//! - **Hit/miss accounting**: per-cache [`CacheStats`] snapshots
//! - **Named caches**: a [`CacheRegistry`] holds one cache per entity kind and
//!   clears them independently or all at once
//!
//! ## Example
//!
//! ```rust
//! use uidcache::cache::{Cache, CacheConfig};
//! use std::time::Duration;
//!
//! let config = CacheConfig::builder()
//!     .ttl(Duration::from_secs(3600))
//!     .max_entries(10_000)
//!     .build();
//!
//! let cache: Cache<String, usize> = Cache::new("sockets", config);
//!
//! // Miss: runs the producer and stores the result
//! let index = cache.get_or_insert_with("Base Color".to_string(), || 4);
//! assert_eq!(index, 4);
//!
//! // Hit: the producer is not called again
//! let index = cache.get_or_insert_with("Base Color".to_string(), || unreachable!());
//! assert_eq!(index, 4);
//! assert_eq!(cache.stats().hits, 1);
//! ```

pub mod config;
pub mod entry;
pub mod invalidation;
pub mod registry;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use invalidation::InvalidationReason;
pub use registry::{CacheRegistry, ManagedCache};
pub use store::Cache;
pub use types::{inline_size, CacheStats, Weigher};
