//! Populate-then-freeze caches shared between sync phases.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Mutable accumulator for a cache that is filled completely before use.
#[derive(Debug)]
pub struct CacheBuilder<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<K: Eq + Hash, V> CacheBuilder<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, value: V) -> &mut Self {
        self.entries.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// End the populate phase. The result is read-only and cheap to clone.
    pub fn freeze(self) -> FrozenCache<K, V> {
        FrozenCache { entries: Arc::new(self.entries) }
    }
}

impl<K: Eq + Hash, V> Extend<(K, V)> for CacheBuilder<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

/// Read-only view of a fully populated cache.
#[derive(Debug)]
pub struct FrozenCache<K, V> {
    entries: Arc<HashMap<K, V>>,
}

impl<K, V> Clone for FrozenCache<K, V> {
    fn clone(&self) -> Self {
        Self { entries: Arc::clone(&self.entries) }
    }
}

impl<K: Eq + Hash, V> FrozenCache<K, V> {
    pub fn empty() -> Self {
        CacheBuilder::new().freeze()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
