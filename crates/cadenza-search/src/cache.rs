//! Bounded first-in, first-out cache.
//!
//! Used to remember query embeddings. Eviction removes the oldest inserted
//! key, regardless of how recently it was read.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Default number of cached query embeddings.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Normalise a query string into a cache key: trimmed, lowercased, with
/// runs of whitespace collapsed to one space.
pub fn query_key(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct FifoCache<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K, V> FifoCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// A capacity of zero disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite. Overwriting keeps the key's original insertion
    /// slot; inserting a new key into a full cache evicts the oldest one.
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = value;
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K, V> Default for FifoCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_key_normalises() {
        assert_eq!(query_key("  Autumn   LEAVES \n"), "autumn leaves");
        assert_eq!(query_key("Осень"), "осень");
    }

    #[test]
    fn test_evicts_oldest_inserted_key() {
        let mut cache = FifoCache::default();
        for i in 0..=1000 {
            cache.insert(format!("query {i}"), vec![i as f32]);
        }

        assert_eq!(cache.len(), 1000);
        assert!(!cache.contains(&"query 0".to_string()));
        assert!(cache.contains(&"query 1000".to_string()));
        assert!(cache.contains(&"query 1".to_string()));
    }

    #[test]
    fn test_reads_do_not_refresh_position() {
        let mut cache = FifoCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));
        cache.insert("c", 3);

        assert!(!cache.contains(&"a"));
        assert!(cache.contains(&"b"));
    }

    #[test]
    fn test_overwrite_keeps_slot_and_size() {
        let mut cache = FifoCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(&10));

        cache.insert("c", 3);
        assert!(!cache.contains(&"a"));
    }

    #[test]
    fn test_zero_capacity_disables() {
        let mut cache = FifoCache::new(0);
        cache.insert("a", 1);
        assert!(cache.is_empty());
    }
}
