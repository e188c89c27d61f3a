// SPDX-License-Identifier: MIT

//! Compiled-artifact cache
//!
//! Bounded, internally synchronized LRU map from raw graph text to compiled
//! graphs. Keys are compared byte for byte: two texts that differ only in
//! whitespace are separate entries.

use crate::error::CacheError;
use crate::policy::graph::CompiledGraph;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default number of compiled graphs kept in memory
pub const DEFAULT_CAPACITY: usize = 128;

pub struct PolicyCache {
    entries: Mutex<LruCache<String, Arc<CompiledGraph>>>,
    capacity: NonZeroUsize,
}

impl PolicyCache {
    /// Create a cache holding at most `capacity` graphs
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(CacheError::ZeroCapacity)?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
        })
    }

    /// Look up a compiled graph, marking it most recently used
    pub fn get(&self, key: &str) -> Option<Arc<CompiledGraph>> {
        self.lock().get(key).cloned()
    }

    /// Insert a compiled graph, evicting the least recently used entry when
    /// full. Replaces any graph already stored under `key`.
    pub fn put(&self, key: impl Into<String>, graph: Arc<CompiledGraph>) {
        let key = key.into();
        if let Some((evicted, _)) = self.lock().push(key.clone(), graph) {
            if evicted != key {
                log::debug!("Evicted policy from cache ({} bytes of text)", evicted.len());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    // Entries are immutable once inserted, so a panic while the lock was
    // held cannot leave a half-written graph behind.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<CompiledGraph>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PolicyCache {
    fn default() -> Self {
        let capacity = NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }
}

impl std::fmt::Debug for PolicyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn graph() -> Arc<CompiledGraph> {
        Arc::new(CompiledGraph::new())
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(PolicyCache::new(0).unwrap_err(), CacheError::ZeroCapacity);
    }

    #[test]
    fn test_get_and_put() {
        let cache = PolicyCache::new(2).unwrap();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());

        let stored = graph();
        cache.put("a", stored.clone());
        let found = cache.get("a").unwrap();
        assert!(Arc::ptr_eq(&found, &stored));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = PolicyCache::new(3).unwrap();
        cache.put("a", graph());
        cache.put("b", graph());
        cache.put("c", graph());
        cache.put("d", graph());

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = PolicyCache::new(2).unwrap();
        cache.put("a", graph());
        cache.put("b", graph());

        // Touch "a" so "b" becomes the oldest
        assert!(cache.get("a").is_some());
        cache.put("c", graph());

        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_put_refreshes_recency_and_replaces() {
        let cache = PolicyCache::new(2).unwrap();
        let first = graph();
        let second = graph();
        cache.put("a", first);
        cache.put("b", graph());
        cache.put("a", second.clone());
        cache.put("c", graph());

        assert!(cache.get("b").is_none());
        assert!(Arc::ptr_eq(&cache.get("a").unwrap(), &second));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_keys_are_byte_exact() {
        let cache = PolicyCache::new(4).unwrap();
        cache.put("digraph { a -> b }", graph());
        assert!(cache.get("digraph {  a -> b }").is_none());
        assert!(cache.get("digraph { a -> b }").is_some());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(PolicyCache::new(16).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("policy-{}", (t * 100 + i) % 32);
                        if cache.get(&key).is_none() {
                            cache.put(key, graph());
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
        assert_eq!(cache.capacity(), 16);
    }
}
