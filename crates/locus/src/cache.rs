//! Bounded TTL cache for ranked result lists.
//!
//! Entries expire a fixed duration after insertion and are checked on read.
//! When the cache is full the least recently used entry is evicted. Expired
//! entries that are never read again are dropped by [`ResultCache::purge_expired`]
//! or displaced by newer inserts.

use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use tracing::{debug, trace};

use crate::config::CacheConfig;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_used: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= ttl
    }
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: AHashMap<K, CacheEntry<V>>,
    tick: u64,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room for new ones.
    pub evictions: u64,
    /// Entries dropped because their TTL ran out.
    pub expirations: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

#[derive(Debug)]
pub struct ResultCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: AHashMap::with_capacity(config.capacity.min(1024)),
                tick: 0,
            }),
            ttl: config.ttl,
            capacity: if config.is_enabled() { config.capacity } else { 0 },
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns a live entry and marks it as recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        let now = Instant::now();
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if entry.is_expired(self.ttl, now) => true,
            Some(entry) => {
                entry.last_used = tick;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            None => false,
        };

        if expired {
            inner.entries.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            trace!("Dropped expired cache entry on read");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Inserts or replaces an entry, evicting the least recently used one
    /// when full. Last write wins.
    pub fn insert(&self, key: K, value: V) {
        if !self.is_enabled() {
            return;
        }
        let now = Instant::now();
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let expired = self.remove_expired(&mut inner, now);
            if expired == 0 {
                self.evict_lru(&mut inner);
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                last_used: tick,
            },
        );
    }

    fn evict_lru(&self, inner: &mut Inner<K, V>) {
        let oldest = inner
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            inner.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn remove_expired(&self, inner: &mut Inner<K, V>, now: Instant) -> usize {
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, entry| !entry.is_expired(self.ttl, now));
        let removed = before - inner.entries.len();
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        let removed = self.remove_expired(&mut inner, Instant::now());
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        let cleared = inner.entries.len();
        inner.entries.clear();
        debug!(cleared, "Cleared result cache");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
