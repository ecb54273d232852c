//! Per-repo result cache.

use crate::types::{Row, Timestamp};
use lru::LruCache;
use std::sync::Arc;
use tracing::debug;

/// Rows fetched for one canonical query.
#[derive(Clone, Debug)]
pub struct CachedResult {
    pub rows: Arc<Vec<Row>>,
    pub fetched_at: Timestamp,
}

/// Results keyed by canonical query string.
///
/// Hits use `peek`, so the LRU order stays the insertion order, which is
/// `fetched_at` order. Once the cache holds more than
/// `max_caches * garbage_factor` entries, the oldest are dropped until
/// `max_caches` remain.
pub(crate) struct QueryCache {
    entries: LruCache<String, CachedResult>,
    generation: u64,
    max_caches: usize,
    garbage_factor: usize,
}

impl QueryCache {
    pub fn new(max_caches: usize, garbage_factor: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            generation: 0,
            max_caches,
            garbage_factor: garbage_factor.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CachedResult> {
        self.entries.peek(key)
    }

    /// Bumped by every invalidation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store rows read at `generation`. Returns false, storing nothing, when
    /// an invalidation happened since.
    pub fn insert(&mut self, generation: u64, key: String, rows: Arc<Vec<Row>>) -> bool {
        if generation != self.generation {
            return false;
        }

        self.entries.put(
            key,
            CachedResult {
                rows,
                fetched_at: Timestamp::now(),
            },
        );
        self.collect_garbage();
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn collect_garbage(&mut self) {
        let threshold = self.max_caches.saturating_mul(self.garbage_factor);
        if self.entries.len() <= threshold {
            return;
        }

        let before = self.entries.len();
        while self.entries.len() > self.max_caches {
            if self.entries.pop_lru().is_none() {
                break;
            }
        }
        debug!(
            evicted = before - self.entries.len(),
            kept = self.entries.len(),
            "query cache eviction"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Arc<Vec<Row>> {
        let mut row = Row::new();
        row.insert("n".into(), n.into());
        Arc::new(vec![row])
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = QueryCache::new(2, 2);
        assert!(cache.insert(0, "a".into(), rows(1)));
        let hit = cache.get("a").unwrap();
        assert_eq!(hit.rows[0]["n"], 1);
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let mut cache = QueryCache::new(2, 2);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.insert(0, key.to_string(), rows(i));
        }
        assert_eq!(cache.len(), 4);

        // Hits do not refresh an entry's rank.
        assert!(cache.get("a").is_some());

        cache.insert(0, "e".into(), rows(4));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_none());
        assert!(cache.get("d").is_some());
        assert!(cache.get("e").is_some());
    }

    #[test]
    fn test_stale_generation_rejected() {
        let mut cache = QueryCache::new(10, 2);
        let generation = cache.generation();
        cache.clear();
        assert!(!cache.insert(generation, "a".into(), rows(1)));
        assert_eq!(cache.len(), 0);
        assert!(cache.insert(cache.generation(), "a".into(), rows(1)));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let mut cache = QueryCache::new(0, 2);
        cache.insert(0, "a".into(), rows(1));
        assert_eq!(cache.len(), 0);
    }
}
