//! Unbounded TTL cache for parsed file contents

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tracing::debug;

use super::CacheStats;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted) >= self.ttl
    }
}

/// Time-to-live cache with no size bound
///
/// Expired entries are dropped lazily on access, or in bulk by [`cleanup`].
///
/// [`cleanup`]: ContentStore::cleanup
#[derive(Debug)]
pub struct ContentStore<K, V> {
    entries: HashMap<K, Entry<V>>,
    default_ttl: Duration,
    hits: u64,
    misses: u64,
}

impl<K, V> ContentStore<K, V>
where
    K: Eq + Hash + std::fmt::Debug,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            hits: 0,
            misses: 0,
        }
    }

    pub fn set(&mut self, key: K, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        debug!(?key, ?ttl, "ContentStore::set: called");
        self.entries.insert(
            key,
            Entry {
                value,
                inserted: Instant::now(),
                ttl,
            },
        );
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => {
                self.misses += 1;
                None
            }
            Some(entry) if entry.is_expired(now) => {
                debug!(?key, "ContentStore::get: expired");
                self.entries.remove(key);
                self.misses += 1;
                None
            }
            Some(entry) => {
                self.hits += 1;
                Some(entry.value.clone())
            }
        }
    }

    pub fn has(&mut self, key: &K) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                self.entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn delete(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        debug!(count = self.entries.len(), "ContentStore::clear: called");
        self.entries.clear();
    }

    /// Remove only the expired entries, returning how many were dropped
    pub fn cleanup(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "ContentStore::cleanup: removed expired entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::new(self.entries.len(), None, self.hits, self.misses)
    }
}
