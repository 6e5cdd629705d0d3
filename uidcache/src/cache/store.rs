//! Main cache store implementation with LRU eviction and lazy TTL expiry

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    invalidation::InvalidationReason,
    types::{inline_size, CacheStats, Weigher},
};
use chrono::{DateTime, Utc};
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Named key/value cache with TTL expiry and LRU eviction
///
/// This implementation provides:
/// - Memoization via [`Cache::get_or_insert_with`]; the producer runs with the
///   lock released and at most once per call
/// - Lazy TTL expiry checked on lookup (there is no background sweeper)
/// - LRU eviction before insert when the entry-count or size bound would be exceeded
/// - One coarse mutex per cache, so a shared cache keeps a single writer
///
/// The cache knows nothing about what it stores; host handles, resolved
/// sockets and plain strings are all just `V`.
pub struct Cache<K, V> {
    name: String,

    /// Cache configuration
    config: CacheConfig,

    /// Approximate size of one entry
    weigher: Weigher<K, V>,

    /// Internal storage
    store: Mutex<CacheStore<K, V>>,
}

/// Internal cache storage
struct CacheStore<K, V> {
    /// Main storage: key -> entry
    entries: HashMap<K, CacheEntry<V>>,

    /// LRU tracking: access tick -> key, oldest first
    lru: BTreeMap<u64, K>,

    /// Next access tick to hand out
    next_tick: u64,

    /// Current cache statistics, kept up to date on every mutation
    stats: CacheStats,

    /// Bumped by `invalidate` and `clear`. A producer result is only stored
    /// if no invalidation happened while the producer ran.
    generation: u64,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            lru: BTreeMap::new(),
            next_tick: 0,
            stats: CacheStats::default(),
            generation: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    /// Return a live value, touching it. Expired entries are dropped.
    fn lookup<Q>(&mut self, key: &Q, now: DateTime<Utc>) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
        V: Clone,
    {
        let expired = self.entries.get(key)?.is_expired_at(now);
        if expired {
            self.remove(key, InvalidationReason::Expired);
            return None;
        }

        let tick = self.tick();
        let entry = self.entries.get_mut(key)?;
        let previous = entry.metadata.access_tick;
        entry.mark_accessed(tick);
        let value = entry.value.clone();

        if let Some(owned) = self.lru.remove(&previous) {
            self.lru.insert(tick, owned);
        }
        Some(value)
    }

    fn remove<Q>(&mut self, key: &Q, reason: InvalidationReason) -> Option<CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        self.lru.remove(&entry.metadata.access_tick);
        self.account_removal(&entry, reason);
        debug!("Removed cache entry ({}): {:?}", reason, key);
        Some(entry)
    }

    fn account_removal(&mut self, entry: &CacheEntry<V>, reason: InvalidationReason) {
        self.stats.size_bytes = self.stats.size_bytes.saturating_sub(entry.metadata.size_bytes);
        self.stats.entries = self.entries.len();
        match reason {
            InvalidationReason::Expired | InvalidationReason::Idle => self.stats.evictions_ttl += 1,
            InvalidationReason::LeastRecentlyUsed => self.stats.evictions_size += 1,
            InvalidationReason::Manual | InvalidationReason::Cleared => {
                self.stats.invalidations += 1
            }
            InvalidationReason::Replaced => {}
        }
    }

    /// Evict least recently used entries until one more entry of `size`
    /// bytes fits.
    fn evict_for(&mut self, size: usize, config: &CacheConfig) {
        while self.entries.len() + 1 > config.max_entries
            || self.stats.size_bytes + size > config.max_size_bytes
        {
            let Some((_, key)) = self.lru.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                debug!("Evicting least recently used entry: {:?}", key);
                self.account_removal(&entry, InvalidationReason::LeastRecentlyUsed);
            }
        }
    }

    fn admit(&mut self, key: K, value: V, size: usize, config: &CacheConfig) {
        // The previous value must never outlive a newer write, even when
        // the newer one cannot be stored.
        self.remove(&key, InvalidationReason::Replaced);

        if config.is_degenerate() || size > config.max_size_bytes {
            debug!("Not storing cache entry (does not fit bounds): {:?}", key);
            return;
        }

        self.evict_for(size, config);

        let tick = self.tick();
        let mut entry = CacheEntry::new(value, config.ttl_with_jitter(), size);
        entry.metadata.access_tick = tick;

        self.lru.insert(tick, key.clone());
        self.entries.insert(key, entry);
        self.stats.size_bytes += size;
        self.stats.entries = self.entries.len();
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + 'static,
    V: Clone + 'static,
{
    /// Create a new cache with the given name and configuration
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        let name = name.into();
        info!("Initializing cache {:?} with config: {:?}", name, config);

        Self {
            name,
            config,
            weigher: Arc::new(inline_size::<K, V>),
            store: Mutex::new(CacheStore::new()),
        }
    }

    /// Replace the default size estimate
    pub fn with_weigher<F>(mut self, weigher: F) -> Self
    where
        F: Fn(&K, &V) -> usize + Send + Sync + 'static,
    {
        self.weigher = Arc::new(weigher);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a live value without producing one on a miss
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.lookup_counted(key).ok()
    }

    /// Counted lookup; a miss reports the generation it was observed in
    fn lookup_counted<Q>(&self, key: &Q) -> Result<V, u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let mut store = self.lock();
        match store.lookup(key, Utc::now()) {
            Some(value) => {
                store.stats.hits += 1;
                debug!("[{}] cache hit: {:?}", self.name, key);
                Ok(value)
            }
            None => {
                store.stats.misses += 1;
                debug!("[{}] cache miss: {:?}", self.name, key);
                Err(store.generation)
            }
        }
    }

    /// Return the cached value for `key`, or run `producer`, store its result
    /// and return it.
    pub fn get_or_insert_with<F>(&self, key: K, producer: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.try_get_or_insert_with(key, || Ok::<V, Infallible>(producer())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`Cache::get_or_insert_with`] with a fallible producer.
    ///
    /// A producer error is returned unchanged and nothing is stored for `key`.
    /// If the cache is cleared or invalidated while the producer runs, its
    /// value is returned but not stored.
    pub fn try_get_or_insert_with<F, E>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let generation = match self.lookup_counted(&key) {
            Ok(value) => return Ok(value),
            Err(generation) => generation,
        };

        // Lock released: the producer may consult other caches, or this one.
        let value = match producer() {
            Ok(value) => value,
            Err(err) => {
                debug!("[{}] producer failed, nothing cached for {:?}", self.name, key);
                return Err(err);
            }
        };

        let size = (self.weigher)(&key, &value);
        let mut store = self.lock();
        if store.generation == generation {
            store.admit(key, value.clone(), size, &self.config);
        } else {
            debug!(
                "[{}] invalidated while producing, not caching {:?}",
                self.name, key
            );
        }
        Ok(value)
    }

    /// Insert or overwrite a value
    pub fn insert(&self, key: K, value: V) {
        let size = (self.weigher)(&key, &value);
        let mut store = self.lock();
        store.admit(key, value, size, &self.config);
    }

    /// Remove one entry; returns whether anything was removed
    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let mut store = self.lock();
        store.generation += 1;
        store.remove(key, InvalidationReason::Manual).is_some()
    }

    /// Clear all entries from the cache, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut store = self.lock();
        store.generation += 1;

        let drained: Vec<CacheEntry<V>> = store.entries.drain().map(|(_, entry)| entry).collect();
        store.lru.clear();
        for entry in &drained {
            store.account_removal(entry, InvalidationReason::Cleared);
        }

        let count = drained.len();

        if count > 0 {
            info!("Cleared {} entries from cache {:?}", count, self.name);
        }
        count
    }

    /// Remove all expired entries now instead of waiting for lookups to find them
    pub fn purge_expired(&self) -> usize {
        let mut store = self.lock();
        let now = Utc::now();

        let expired: Vec<K> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            store.remove(key, InvalidationReason::Expired);
        }

        if !expired.is_empty() {
            debug!("[{}] purged {} expired entries", self.name, expired.len());
        }
        expired.len()
    }

    /// Remove entries that have not been read or written for longer than
    /// `max_idle`, whatever their TTL
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let mut store = self.lock();

        let idle: Vec<K> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.metadata.is_stale(max_idle))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &idle {
            store.remove(key, InvalidationReason::Idle);
        }

        if !idle.is_empty() {
            debug!("[{}] purged {} idle entries", self.name, idle.len());
        }
        idle.len()
    }

    /// Check for a live entry without counting an access or touching LRU order
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let store = self.lock();
        store
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }

    /// Zero the hit/miss/eviction counters, keeping the entries
    pub fn reset_stats(&self) {
        let mut store = self.lock();
        store.stats = CacheStats {
            entries: store.entries.len(),
            size_bytes: store.stats.size_bytes,
            ..CacheStats::default()
        };
    }

    /// Get number of entries in cache, expired or not
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, CacheStore<K, V>> {
        self.store.lock().unwrap_or_else(|poisoned| {
            warn!("Cache {:?} lock was poisoned; continuing with its contents", self.name);
            poisoned.into_inner()
        })
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
