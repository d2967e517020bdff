//! Bounded, time-expiring multimap backing the fingerprint index.
//!
//! Each key maps to a short list of entries. A full list only admits an entry
//! that is newer than its oldest member, which it then replaces; entries that
//! were cached longer ago than the TTL are pruned by [`BucketCache::gc`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What a cache entry must expose for eviction and expiry.
pub trait CacheEntry {
    /// When the underlying event happened (unix seconds). Eviction order.
    fn event_time(&self) -> i64;
    /// When the entry was cached (unix seconds). Expiry.
    fn cached_at(&self) -> i64;
    /// `true` if both entries describe the same underlying event.
    fn same_event(&self, other: &Self) -> bool;
    /// Called when an entry for an already cached event is inserted again.
    fn refresh_from(&mut self, newer: Self);
}

/// Capacity and lifetime limits of a [`BucketCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    /// Maximum entries per key.
    pub capacity: usize,
    /// Entries whose cache age exceeds this many seconds are dropped.
    pub ttl_secs: i64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self { capacity: 3, ttl_secs: 7200 }
    }
}

/// Outcome of [`BucketCache::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// The bucket had room.
    Added,
    /// The event was already cached; its entry was refreshed in place.
    Refreshed,
    /// The bucket was full and the oldest entry was evicted.
    Replaced,
    /// The bucket was full and the entry was older than everything in it.
    Rejected,
}

/// `key → [entry; ≤ capacity]`, kept in insertion order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketCache<V> {
    buckets: BTreeMap<String, Vec<V>>,
}

impl<V> Default for BucketCache<V> {
    fn default() -> Self {
        Self { buckets: BTreeMap::new() }
    }
}

impl<V: CacheEntry> BucketCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries under `key`, oldest insertion first.
    pub fn get(&self, key: &str) -> &[V] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.buckets.contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of entries across all keys.
    pub fn entry_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[V])> {
        self.buckets.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Inserts `entry` under `key`, evicting per `policy`.
    pub fn insert(&mut self, key: &str, entry: V, policy: &CachePolicy) -> Insertion {
        let bucket = self.buckets.entry(key.to_owned()).or_default();

        if let Some(existing) = bucket.iter_mut().find(|e| e.same_event(&entry)) {
            existing.refresh_from(entry);
            return Insertion::Refreshed;
        }

        if bucket.len() < policy.capacity {
            bucket.push(entry);
            return Insertion::Added;
        }

        let oldest = bucket
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.event_time())
            .map(|(i, e)| (i, e.event_time()));

        match oldest {
            Some((idx, oldest_time)) if entry.event_time() > oldest_time => {
                bucket.remove(idx);
                bucket.push(entry);
                Insertion::Replaced
            }
            // capacity 0 leaves an empty bucket behind; drop it again
            None => {
                self.buckets.remove(key);
                Insertion::Rejected
            }
            Some(_) => Insertion::Rejected,
        }
    }

    /// Drops entries cached more than `ttl_secs` before `now`, then every key
    /// left without entries. Returns the number of keys removed.
    pub fn gc(&mut self, now: i64, policy: &CachePolicy) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            bucket.retain(|e| now - e.cached_at() <= policy.ttl_secs);
            !bucket.is_empty()
        });
        before - self.buckets.len()
    }
}
