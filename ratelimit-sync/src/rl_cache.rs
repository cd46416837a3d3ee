//! Memoized `RateLimitConfig` lookups.
//!
//! Looking a config up by namespace and name is a linear scan of the
//! snapshot. The cache builds a full index of a snapshot on its first lookup
//! and keeps the indexes of the last few snapshots in an LRU keyed by
//! snapshot identity. Entries only hold a weak reference to their snapshot:
//! once the owner drops it, [`RlCache::purge`] (or an explicit
//! [`RlCache::release`]) frees the index without waiting for the LRU.

use crate::errors::RlCacheError;
use crate::model::{ApiSnapshot, RateLimitConfig, ResourceRef};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, Weak};

pub const DEFAULT_CAPACITY: usize = 10;

type ConfigIndex = HashMap<ResourceRef, RateLimitConfig>;

struct Entry {
    snapshot: Weak<ApiSnapshot>,
    index: Arc<ConfigIndex>,
}

pub struct RlCache {
    entries: Mutex<LruCache<u64, Entry>>,
}

impl Default for RlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RlCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of 0 falls back to [`DEFAULT_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn find_rate_limit(
        &self,
        snapshot: &Arc<ApiSnapshot>,
        namespace: &str,
        name: &str,
    ) -> Result<RateLimitConfig, RlCacheError> {
        let index = self.index_for(snapshot);
        lookup(&index, namespace, name)
    }

    /// Like [`RlCache::find_rate_limit`], but never indexes the snapshot.
    pub fn find_cached(
        &self,
        snapshot: &ApiSnapshot,
        namespace: &str,
        name: &str,
    ) -> Result<RateLimitConfig, RlCacheError> {
        let index = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get(&snapshot.id()) {
                Some(entry) if entry.snapshot.strong_count() > 0 => entry.index.clone(),
                _ => return Err(RlCacheError::NotCached(snapshot.id())),
            }
        };
        lookup(&index, namespace, name)
    }

    fn index_for(&self, snapshot: &Arc<ApiSnapshot>) -> Arc<ConfigIndex> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(&snapshot.id()) {
            if entry.snapshot.strong_count() > 0 {
                return entry.index.clone();
            }
        }

        let index: Arc<ConfigIndex> = Arc::new(
            snapshot
                .ratelimit_configs
                .iter()
                .map(|config| (config.metadata.resource_ref(), config.clone()))
                .collect(),
        );
        entries.put(
            snapshot.id(),
            Entry {
                snapshot: Arc::downgrade(snapshot),
                index: index.clone(),
            },
        );
        index
    }

    /// Drops the index of a snapshot. Returns whether there was one.
    pub fn release(&self, snapshot: &ApiSnapshot) -> bool {
        self.entries.lock().unwrap().pop(&snapshot.id()).is_some()
    }

    /// Drops the indexes of every snapshot that is no longer alive and
    /// returns how many were dropped.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let dead: Vec<u64> = entries
            .iter()
            .filter(|(_, entry)| entry.snapshot.strong_count() == 0)
            .map(|(id, _)| *id)
            .collect();
        for id in &dead {
            entries.pop(id);
        }
        dead.len()
    }

    /// Number of indexed snapshots that are still alive.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, entry)| entry.snapshot.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lookup(index: &ConfigIndex, namespace: &str, name: &str) -> Result<RateLimitConfig, RlCacheError> {
    index
        .get(&ResourceRef::new(namespace, name))
        .cloned()
        .ok_or_else(|| RlCacheError::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::RawSpec;

    fn snapshot() -> Arc<ApiSnapshot> {
        Arc::new(ApiSnapshot::new(
            vec![],
            vec![
                RateLimitConfig::new("default", "foo", RawSpec::default()),
                RateLimitConfig::new("other", "bar", RawSpec::default()),
            ],
        ))
    }

    #[test]
    fn finds_configs_by_namespace_and_name() {
        let cache = RlCache::new();
        let snap = snapshot();

        let found = cache.find_rate_limit(&snap, "other", "bar").unwrap();
        assert_eq!(found, snap.ratelimit_configs[1]);

        assert_eq!(
            cache.find_rate_limit(&snap, "default", "bar"),
            Err(RlCacheError::NotFound {
                namespace: "default".to_string(),
                name: "bar".to_string()
            })
        );
    }

    #[test]
    fn identical_snapshots_get_their_own_entries() {
        let cache = RlCache::new();
        let first = snapshot();
        let second = Arc::new(first.as_ref().clone());

        cache.find_rate_limit(&first, "default", "foo").unwrap();
        cache.find_rate_limit(&second, "default", "foo").unwrap();

        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn dropped_snapshots_are_purged() {
        let cache = RlCache::new();
        let kept = snapshot();
        let dropped = snapshot();
        cache.find_rate_limit(&kept, "default", "foo").unwrap();
        cache.find_rate_limit(&dropped, "default", "foo").unwrap();

        drop(dropped);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn release_evicts_explicitly() {
        let cache = RlCache::new();
        let snap = snapshot();
        cache.find_rate_limit(&snap, "default", "foo").unwrap();

        assert!(cache.release(&snap));
        assert!(!cache.release(&snap));
        assert!(cache.is_empty());
        assert_eq!(
            cache.find_cached(&snap, "default", "foo"),
            Err(RlCacheError::NotCached(snap.id()))
        );
    }

    #[test]
    fn capacity_is_bounded() {
        let cache = RlCache::with_capacity(2);
        let snapshots: Vec<_> = (0..3).map(|_| snapshot()).collect();
        for snap in &snapshots {
            cache.find_rate_limit(snap, "default", "foo").unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.find_cached(&snapshots[0], "default", "foo").is_err());
        assert!(cache.find_cached(&snapshots[2], "default", "foo").is_ok());
    }
}
