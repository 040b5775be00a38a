// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Bounded, time-limited cache with explicit release

use log::debug;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

use super::{CacheEntryMetadata, CacheStats};

/// LRU eviction tracker
///
/// Every access stamps the key with a fresh tick; the smallest tick is the
/// least recently used. All operations are logarithmic in the entry count.
#[derive(Debug)]
struct LRUTracker<K> {
    tick: u64,
    stamps: HashMap<K, u64>,
    order: BTreeMap<u64, K>,
}

impl<K: Clone + Eq + Hash> LRUTracker<K> {
    fn new() -> Self {
        Self {
            tick: 0,
            stamps: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    fn access(&mut self, key: &K) {
        self.tick += 1;
        if let Some(previous) = self.stamps.insert(key.clone(), self.tick) {
            self.order.remove(&previous);
        }
        self.order.insert(self.tick, key.clone());
    }

    fn remove(&mut self, key: &K) {
        if let Some(stamp) = self.stamps.remove(key) {
            self.order.remove(&stamp);
        }
    }

    fn remove_lru(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }

    fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
    }
}

struct SoftCacheInner<K, V> {
    entries: HashMap<K, (V, CacheEntryMetadata)>,
    lru: LRUTracker<K>,
    stats: CacheStats,
}

/// Cache whose entries may be dropped at any time
///
/// Entries leave the cache when the entry bound is exceeded (least recently
/// used first), when their time-to-live elapses, or when [`SoftCache::release`]
/// is called. Values are cloned out, so `V` is usually an `Arc`.
pub struct SoftCache<K, V> {
    name: &'static str,
    max_entries: usize,
    ttl: Option<Duration>,
    inner: Mutex<SoftCacheInner<K, V>>,
}

impl<K, V> SoftCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(name: &'static str, max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            name,
            max_entries: max_entries.max(1),
            ttl,
            inner: Mutex::new(SoftCacheInner {
                entries: HashMap::new(),
                lru: LRUTracker::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.stats.total_requests += 1;

        let expired = match inner.entries.get_mut(key) {
            Some((_, meta)) if meta.is_expired() => true,
            Some((_, meta)) => {
                meta.update_access();
                false
            }
            None => {
                inner.stats.misses += 1;
                return None;
            }
        };

        if expired {
            inner.entries.remove(key);
            inner.lru.remove(key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
            return None;
        }

        inner.lru.access(key);
        inner.stats.hits += 1;
        inner.entries.get(key).map(|(value, _)| value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let meta = CacheEntryMetadata::new().with_ttl(self.ttl);
        inner.lru.access(&key);
        inner.entries.insert(key, (value, meta));
        inner.stats.insertions += 1;

        while inner.entries.len() > self.max_entries {
            match inner.lru.remove_lru() {
                Some(evicted) => {
                    inner.entries.remove(&evicted);
                    inner.stats.evictions += 1;
                }
                None => break,
            }
        }
    }

    /// Return the cached value or compute and cache it
    ///
    /// The computation runs without holding the cache lock; two racing callers
    /// may both compute, and the later insert wins.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        inner.lru.remove(key);
        inner.entries.remove(key).map(|(value, _)| value)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.lru.clear();
    }

    /// Drop every entry in response to memory pressure
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        let released = inner.entries.len();
        inner.entries.clear();
        inner.lru.clear();
        inner.stats.releases += 1;
        debug!("Released {} entries from {} cache", released, self.name);
    }

    /// Drop expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, (_, meta))| meta.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.entries.remove(key);
            inner.lru.remove(key);
        }
        inner.stats.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }
}
