//! In-memory entry storage.
//!
//! [`EntryStore`] is a plain map with no locking of its own. The engine owns
//! exactly one store per cache and guards it, together with the in-flight
//! table, behind a single mutex.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use super::clock::Timestamp;

/// A cached value and the moment it was written.
///
/// The value is shared as an [`Arc`], so callers get a read-only view and
/// can never mutate what the cache holds. An entry is never updated in
/// place; a refresh replaces the whole entry.
#[derive(Debug)]
pub struct CacheEntry<V> {
    value: Arc<V>,
    inserted_at: Timestamp,
}

impl<V> CacheEntry<V> {
    /// Creates an entry written at `inserted_at`.
    pub fn new(value: Arc<V>, inserted_at: Timestamp) -> Self {
        Self { value, inserted_at }
    }

    /// Returns the cached value.
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    /// Returns when the entry was written.
    pub fn inserted_at(&self) -> Timestamp {
        self.inserted_at
    }

    /// Age of the entry at `now`.
    pub fn age(&self, now: Timestamp) -> Duration {
        now.elapsed_since(self.inserted_at)
    }

    /// Returns `true` while the entry is younger than `ttl`.
    ///
    /// An entry whose age equals `ttl` is already stale.
    pub fn is_fresh(&self, now: Timestamp, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            inserted_at: self.inserted_at,
        }
    }
}

/// Key → [`CacheEntry`] mapping with no ordering guarantees.
///
/// Stale entries stay here until they are overwritten or removed; nothing
/// sweeps them in the background.
#[derive(Debug)]
pub struct EntryStore<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K, V> Default for EntryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `key`, fresh or not.
    pub fn get(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Writes `entry` under `key`, returning the entry it replaced.
    pub fn put(&mut self, key: K, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        self.entries.insert(key, entry)
    }

    /// Removes the entry for `key`. Returns `true` if one was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes every entry whose key matches `predicate`, returning how many
    /// were removed.
    pub fn remove_where<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        before - self.entries.len()
    }

    /// Removes every entry, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
