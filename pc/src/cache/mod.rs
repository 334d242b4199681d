//! In-memory caches
//!
//! - [`LruCache`] - bounded least-recently-used cache with per-entry TTL
//! - [`ContentStore`] - unbounded TTL cache for parsed file contents

mod content;
mod lru;

pub use content::ContentStore;
pub use lru::LruCache;

use serde::Serialize;

/// Hit/miss counters for a cache
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    /// `None` for unbounded caches
    pub capacity: Option<usize>,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub(crate) fn new(size: usize, capacity: Option<usize>, hits: u64, misses: u64) -> Self {
        let total = hits + misses;
        let hit_rate = if total > 0 { hits as f64 / total as f64 } else { 0.0 };
        Self {
            size,
            capacity,
            hits,
            misses,
            hit_rate,
        }
    }
}
