//! Named caches shared by one document session
//!
//! The registry replaces module-level cache singletons: it is constructed
//! explicitly, shared through an `Arc`, and handed to both the resolvers that
//! fill caches and the lifecycle hooks that clear them.

use crate::cache::{config::CacheConfig, store::Cache, types::CacheStats};
use crate::error::{Result, UidCacheError};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{Debug, Write};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Type-erased view of a [`Cache`] used for bulk lifecycle operations
pub trait ManagedCache: Send + Sync {
    fn name(&self) -> &str;

    /// Drop every entry, returning how many were removed
    fn clear(&self) -> usize;

    fn stats(&self) -> CacheStats;

    fn purge_expired(&self) -> usize;

    fn purge_idle(&self, max_idle: Duration) -> usize;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<K, V> ManagedCache for Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        Cache::name(self)
    }

    fn clear(&self) -> usize {
        Cache::clear(self)
    }

    fn stats(&self) -> CacheStats {
        Cache::stats(self)
    }

    fn purge_expired(&self) -> usize {
        Cache::purge_expired(self)
    }

    fn purge_idle(&self, max_idle: Duration) -> usize {
        Cache::purge_idle(self, max_idle)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Registry of named caches, one per entity kind
pub struct CacheRegistry {
    caches: Mutex<BTreeMap<String, Arc<dyn ManagedCache>>>,

    /// Configuration used by [`CacheRegistry::get_or_register`]
    default_config: CacheConfig,
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::with_default_config(CacheConfig::default())
    }

    pub fn with_default_config(default_config: CacheConfig) -> Self {
        Self {
            caches: Mutex::new(BTreeMap::new()),
            default_config,
        }
    }

    pub fn default_config(&self) -> &CacheConfig {
        &self.default_config
    }

    /// Create and register a cache under `name`
    pub fn register<K, V>(&self, name: &str, config: CacheConfig) -> Result<Arc<Cache<K, V>>>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        config.validate()?;
        self.register_cache(Cache::new(name, config))
    }

    /// Register an already constructed cache (for example one with a custom weigher)
    pub fn register_cache<K, V>(&self, cache: Cache<K, V>) -> Result<Arc<Cache<K, V>>>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        cache.config().validate()?;

        let mut caches = self.lock();
        let name = cache.name().to_string();
        if caches.contains_key(&name) {
            return Err(UidCacheError::DuplicateCacheName(name));
        }

        let cache = Arc::new(cache);
        caches.insert(name.clone(), cache.clone());
        debug!("Registered cache {:?}", name);
        Ok(cache)
    }

    /// Fetch the cache registered under `name`, creating it with the default
    /// configuration on first use
    pub fn get_or_register<K, V>(&self, name: &str) -> Result<Arc<Cache<K, V>>>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut caches = self.lock();

        if let Some(existing) = caches.get(name) {
            return existing
                .clone()
                .into_any()
                .downcast::<Cache<K, V>>()
                .map_err(|_| UidCacheError::CacheTypeMismatch(name.to_string()));
        }

        let cache = Arc::new(Cache::new(name, self.default_config.clone()));
        caches.insert(name.to_string(), cache.clone());
        Ok(cache)
    }

    /// Clear every registered cache. Returns the total number of entries dropped.
    pub fn clear_all(&self) -> usize {
        let caches = self.lock();
        let total: usize = caches.values().map(|cache| cache.clear()).sum();
        info!("Cleared {} caches ({} entries)", caches.len(), total);
        total
    }

    /// Clear one cache; `None` if no cache has that name
    pub fn clear(&self, name: &str) -> Option<usize> {
        self.lock().get(name).map(|cache| cache.clear())
    }

    /// Sweep expired entries from every cache
    pub fn purge_expired_all(&self) -> usize {
        self.lock().values().map(|cache| cache.purge_expired()).sum()
    }

    /// Drop entries idle for longer than `max_idle` from every cache, to free
    /// memory during long sessions
    pub fn purge_idle_all(&self, max_idle: Duration) -> usize {
        let purged: usize = self
            .lock()
            .values()
            .map(|cache| cache.purge_idle(max_idle))
            .sum();
        if purged > 0 {
            info!("Purged {} idle cache entries", purged);
        }
        purged
    }

    /// Statistics for one cache
    pub fn get_stats(&self, name: &str) -> Option<CacheStats> {
        self.lock().get(name).map(|cache| cache.stats())
    }

    /// Statistics for every cache, keyed by name
    pub fn all_stats(&self) -> BTreeMap<String, CacheStats> {
        self.lock()
            .iter()
            .map(|(name, cache)| (name.clone(), cache.stats()))
            .collect()
    }

    /// Statistics for every cache as a JSON object, for diagnostics surfaces
    pub fn stats_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.all_stats())
            .map_err(|e| UidCacheError::SerializationError(e.to_string()))
    }

    /// Human-readable summary of every cache
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (name, stats) in self.all_stats() {
            let _ = writeln!(out, "Cache '{}':", name);
            let _ = writeln!(out, "  Entries: {}", stats.entries);
            let _ = writeln!(out, "  Size: {:.2}MB", stats.size_bytes as f64 / (1024.0 * 1024.0));
            let _ = writeln!(out, "  Hits: {}", stats.hits);
            let _ = writeln!(out, "  Misses: {}", stats.misses);
            let _ = writeln!(out, "  Hit Rate: {:.1}%", stats.hit_rate() * 100.0);
        }
        out
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Arc<dyn ManagedCache>>> {
        self.caches.lock().unwrap_or_else(|poisoned| {
            warn!("Cache registry lock was poisoned; continuing with its contents");
            poisoned.into_inner()
        })
    }
}

impl Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.names())
            .field("default_config", &self.default_config)
            .finish()
    }
}
