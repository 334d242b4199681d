//! Bounded LRU cache with per-entry TTL
//!
//! Entries live in a slab (`Vec<Option<Node>>`) linked into a doubly-linked
//! recency list by index, with a `HashMap` from key to slot. The head of the
//! list is the most recently used entry; the tail is evicted first.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tracing::debug;

use super::CacheStats;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    inserted: Instant,
    ttl: Option<Duration>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<K, V> Node<K, V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl.is_some_and(|ttl| now.duration_since(self.inserted) >= ttl)
    }
}

/// Least-recently-used cache with lazy TTL expiry
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    default_ttl: Option<Duration>,
    index: HashMap<K, usize>,
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    hits: u64,
    misses: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries with no default TTL
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            default_ttl: None,
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            hits: 0,
            misses: 0,
        }
    }

    /// Create a cache whose entries expire after `ttl` unless `set` overrides it
    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        Self {
            default_ttl: Some(ttl),
            ..Self::new(capacity)
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn node(&self, idx: usize) -> &Node<K, V> {
        self.slots[idx].as_ref().expect("linked slot is occupied")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K, V> {
        self.slots[idx].as_mut().expect("linked slot is occupied")
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let node = self.node_mut(idx);
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.node_mut(h).prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    /// Unlink and free a slot, returning its node
    fn remove_slot(&mut self, idx: usize) -> Node<K, V> {
        self.detach(idx);
        let node = self.slots[idx].take().expect("linked slot is occupied");
        self.index.remove(&node.key);
        self.free.push(idx);
        node
    }

    fn evict_lru(&mut self) {
        if let Some(tail) = self.tail {
            self.remove_slot(tail);
            debug!(size = self.index.len(), "LruCache::evict_lru: evicted tail");
        }
    }

    /// Insert or replace `key`, making it the most recently used entry
    ///
    /// `ttl` overrides the cache's default TTL for this entry.
    pub fn set(&mut self, key: K, value: V, ttl: Option<Duration>) {
        let ttl = ttl.or(self.default_ttl);
        if let Some(&idx) = self.index.get(&key) {
            self.detach(idx);
            let node = self.node_mut(idx);
            node.value = value;
            node.inserted = Instant::now();
            node.ttl = ttl;
            self.push_front(idx);
            return;
        }

        let node = Node {
            key: key.clone(),
            value,
            inserted: Instant::now(),
            ttl,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.push_front(idx);

        if self.index.len() > self.capacity {
            self.evict_lru();
        }
    }

    /// Look up `key`, counting a hit or a miss
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let Some(&idx) = self.index.get(key) else {
            self.misses += 1;
            return None;
        };

        if self.node(idx).is_expired(Instant::now()) {
            self.remove_slot(idx);
            self.misses += 1;
            return None;
        }

        if self.head != Some(idx) {
            self.detach(idx);
            self.push_front(idx);
        }
        self.hits += 1;
        Some(self.node(idx).value.clone())
    }

    /// Whether `key` is present and live; does not touch recency or stats
    pub fn has(&mut self, key: &K) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        if self.node(idx).is_expired(Instant::now()) {
            self.remove_slot(idx);
            return false;
        }
        true
    }

    pub fn delete(&mut self, key: &K) -> bool {
        match self.index.get(key).copied() {
            Some(idx) => {
                self.remove_slot(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every entry and reset the hit/miss counters
    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::new(self.index.len(), Some(self.capacity), self.hits, self.misses)
    }

    pub fn get_many(&mut self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    pub fn set_many(&mut self, entries: impl IntoIterator<Item = (K, V, Option<Duration>)>) {
        for (key, value, ttl) in entries {
            self.set(key, value, ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_evicts_least_recently_inserted() {
        let mut cache = LruCache::new(3);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("c", 3, None);
        cache.set("d", 4, None);

        assert_eq!(cache.len(), 3);
        assert!(!cache.has(&"a"));
        assert!(cache.has(&"b"));
        assert!(cache.has(&"c"));
        assert!(cache.has(&"d"));
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let mut cache = LruCache::new(3);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("c", 3, None);

        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("d", 4, None);

        assert!(cache.has(&"a"));
        assert!(!cache.has(&"b"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_set_existing_key_replaces_and_refreshes() {
        let mut cache = LruCache::new(2);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("a", 10, None);
        cache.set("c", 3, None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert!(!cache.has(&"b"));
    }

    #[test]
    fn test_ttl_expiry_without_capacity_pressure() {
        let mut cache = LruCache::new(10);
        cache.set("short", 1, Some(Duration::from_millis(20)));
        cache.set("long", 2, None);

        assert_eq!(cache.get(&"short"), Some(1));
        sleep(Duration::from_millis(40));

        assert_eq!(cache.get(&"short"), None);
        assert_eq!(cache.get(&"long"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_default_ttl_applies() {
        let mut cache = LruCache::with_ttl(4, Duration::from_millis(20));
        cache.set("a", 1, None);
        cache.set("b", 2, Some(Duration::from_secs(60)));
        sleep(Duration::from_millis(40));

        assert!(!cache.has(&"a"));
        assert!(cache.has(&"b"));
    }

    #[test]
    fn test_stats_hits_and_misses() {
        let mut cache = LruCache::new(2);
        cache.set("a", 1, None);
        cache.get(&"a");
        cache.get(&"a");
        cache.get(&"zzz");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(stats.capacity, Some(2));
    }

    #[test]
    fn test_expired_get_counts_as_miss() {
        let mut cache = LruCache::new(2);
        cache.set("a", 1, Some(Duration::ZERO));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.stats().misses, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_delete_and_slot_reuse() {
        let mut cache = LruCache::new(2);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        assert!(cache.delete(&"a"));
        assert!(!cache.delete(&"a"));

        cache.set("c", 3, None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut cache = LruCache::new(0);
        cache.set(1, "x", None);
        cache.set(2, "y", None);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2), Some("y"));
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut cache = LruCache::new(5);
        for i in 0..100 {
            cache.set(i, i * 2, None);
            if i % 3 == 0 {
                cache.get(&(i / 2));
            }
            assert!(cache.len() <= 5);
        }
    }

    #[test]
    fn test_batch_helpers() {
        let mut cache = LruCache::new(4);
        cache.set_many(vec![("a", 1, None), ("b", 2, None)]);
        assert_eq!(cache.get_many(&["a", "b", "c"]), vec![Some(1), Some(2), None]);
    }

    #[test]
    fn test_clear_resets_stats() {
        let mut cache = LruCache::new(2);
        cache.set("a", 1, None);
        cache.get(&"a");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
        cache.set("b", 2, None);
        assert_eq!(cache.get(&"b"), Some(2));
    }
}
