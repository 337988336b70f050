//! Capacity-bounded object cache with least-recently-used eviction.
//!
//! Entries live in a slab of nodes linked into a recency list, so `get` and
//! `put` are O(1). Accessing an entry through [`ObjectCache::get`] moves it to
//! the front of the list; inserting into a full cache evicts the tail.

use std::collections::HashMap;
use std::hash::Hash;

/// Default number of shows kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

const NIL: usize = usize::MAX;

struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// Hit, miss and eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct ObjectCache<K, V> {
    capacity: usize,
    nodes: Vec<Node<K, V>>,
    index: HashMap<K, usize>,
    /// Most recently used.
    head: usize,
    /// Least recently used.
    tail: usize,
    stats: CacheStats,
}

impl<K, V> ObjectCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            nodes: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            stats: CacheStats::default(),
        }
    }

    /// Look up an entry, marking it most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        match self.index.get(key).copied() {
            Some(slot) => {
                self.stats.hits += 1;
                self.detach(slot);
                self.push_front(slot);
                Some(&self.nodes[slot].value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or replace an entry, evicting the least recently used entry
    /// when the cache is full. Returns the evicted pair, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&slot) = self.index.get(&key) {
            self.nodes[slot].value = value;
            self.detach(slot);
            self.push_front(slot);
            return None;
        }

        if self.nodes.len() < self.capacity {
            let slot = self.nodes.len();
            self.nodes.push(Node {
                key: key.clone(),
                value,
                prev: NIL,
                next: NIL,
            });
            self.index.insert(key, slot);
            self.push_front(slot);
            return None;
        }

        // Full: reuse the tail slot for the new entry.
        let slot = self.tail;
        self.detach(slot);
        let node = &mut self.nodes[slot];
        let old_key = std::mem::replace(&mut node.key, key.clone());
        let old_value = std::mem::replace(&mut node.value, value);
        self.index.remove(&old_key);
        self.index.insert(key, slot);
        self.push_front(slot);
        self.stats.evictions += 1;

        Some((old_key, old_value))
    }

    /// Whether `key` is cached. Does not affect recency.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            cache: self,
            cursor: self.head,
        }
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);

        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }

        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = NIL;
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = self.head;

        if self.head != NIL {
            self.nodes[self.head].prev = slot;
        }
        self.head = slot;

        if self.tail == NIL {
            self.tail = slot;
        }
    }
}

pub struct Keys<'a, K, V> {
    cache: &'a ObjectCache<K, V>,
    cursor: usize,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.cache.nodes[self.cursor];
        self.cursor = node.next;
        Some(&node.key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

    use super::*;

    #[test]
    fn test_put_and_get() {
        let mut cache = ObjectCache::new(2);

        cache.put("apple", "red");
        cache.put("banana", "yellow");

        assert_eq!(cache.get(&"apple"), Some(&"red"));
        assert_eq!(cache.get(&"banana"), Some(&"yellow"));
        assert_eq!(cache.get(&"cherry"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_put_evicts_least_recently_used() {
        let mut cache = ObjectCache::new(2);

        cache.put("apple", "red");
        cache.put("banana", "yellow");
        // Touch apple so banana becomes the eviction candidate.
        cache.get(&"apple");

        let evicted = cache.put("orange", "orange");
        assert_eq!(evicted, Some(("banana", "yellow")));
        assert!(cache.contains(&"apple"));
        assert!(cache.contains(&"orange"));
        assert!(!cache.contains(&"banana"));
    }

    #[test]
    fn test_put_existing_key_replaces_value() {
        let mut cache = ObjectCache::new(2);

        cache.put(1, "one");
        cache.put(2, "two");
        assert_eq!(cache.put(1, "uno"), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), Some(&"uno"));
        // 1 was refreshed by the replacement, so 2 goes first.
        cache.put(3, "three");
        assert!(!cache.contains(&2));
    }

    #[test]
    fn test_capacity_bound_with_distinct_keys() {
        let mut cache = ObjectCache::new(DEFAULT_CACHE_CAPACITY);

        for i in 0..=DEFAULT_CACHE_CAPACITY {
            cache.put(i, i * 2);
        }

        assert_eq!(cache.len(), DEFAULT_CACHE_CAPACITY);
        assert!(!cache.contains(&0));
        for i in 1..=DEFAULT_CACHE_CAPACITY {
            assert!(cache.contains(&i), "missing {}", i);
        }
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_keys_in_recency_order() {
        let mut cache = ObjectCache::new(3);
        cache.put('a', ());
        cache.put('b', ());
        cache.put('c', ());
        cache.get(&'a');

        let keys: Vec<_> = cache.keys().copied().collect();
        assert_eq!(keys, vec!['a', 'c', 'b']);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = ObjectCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put(1, 1);
        cache.put(2, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&2));
    }

    #[test]
    fn test_stats() {
        let mut cache = ObjectCache::new(2);
        cache.put(1, 1);
        cache.get(&1);
        cache.get(&1);
        cache.get(&2);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_no_memory_leaks() {
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropCounter;

        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, SeqCst);
            }
        }

        let n = 50;
        for _ in 0..n {
            let mut cache = ObjectCache::new(10);
            for i in 0..n {
                // Evicted values are returned and dropped here.
                cache.put(i, DropCounter);
            }
        }
        assert_eq!(DROP_COUNT.load(SeqCst), n * n);
    }
}
