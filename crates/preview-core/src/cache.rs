//! Bounded least-recently-used cache for rendered previews

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Fixed-capacity LRU map.
///
/// `get` and `set` both count as a touch. Inserting past capacity evicts
/// exactly one entry, the least recently touched. There is no expiry: the
/// key composition decides freshness. Not synchronised; owned by one loop.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, (V, u64)>,
    /// Touch stamp -> key, oldest first
    order: BTreeMap<u64, K>,
    clock: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Create a cache holding at most `capacity` entries (minimum one)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            clock: 0,
        }
    }

    /// Look up a value and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let stamp = self.next_stamp();
        let (_, old_stamp) = self.entries.get(key)?;
        let old_stamp = *old_stamp;
        self.order.remove(&old_stamp);
        self.order.insert(stamp, key.clone());
        let entry = self.entries.get_mut(key)?;
        entry.1 = stamp;
        Some(&entry.0)
    }

    /// Look up a value without touching it
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(value, _)| value)
    }

    /// Insert or replace a value, marking it most recently used.
    ///
    /// Returns the evicted entry when the insert pushed the cache over capacity.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        let stamp = self.next_stamp();
        if let Some((_, old_stamp)) = self.entries.remove(&key) {
            self.order.remove(&old_stamp);
        }
        self.order.insert(stamp, key.clone());
        self.entries.insert(key, (value, stamp));

        if self.entries.len() > self.capacity {
            return self.evict_oldest();
        }
        None
    }

    pub fn has(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        let (value, stamp) = self.entries.remove(key)?;
        self.order.remove(&stamp);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_oldest(&mut self) -> Option<(K, V)> {
        let (&stamp, _) = self.order.iter().next()?;
        let key = self.order.remove(&stamp)?;
        let (value, _) = self.entries.remove(&key)?;
        Some((key, value))
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}
