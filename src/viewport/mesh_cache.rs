//! Content-addressed mesh cache
//!
//! Meshes are keyed by the serialized geometry spec. The cache remembers
//! which keys are in flight so that asking twice for the same spec costs
//! one backend call, and it also remembers specs the server had no mesh for.

use crate::backend::MeshData;
use log::debug;
use lru::LruCache;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Cache key of a geometry spec
pub fn mesh_key(spec: &Value) -> String {
    spec.to_string()
}

/// Issues mesh requests to whatever serves them
pub trait MeshFetch {
    fn fetch_mesh(&mut self, key: &str, spec: &Value);
}

impl<F> MeshFetch for F
where
    F: FnMut(&str, &Value),
{
    fn fetch_mesh(&mut self, key: &str, spec: &Value) {
        self(key, spec)
    }
}

/// How many meshes to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Keep everything
    Unbounded,
    /// Keep the most recently used meshes
    Lru(NonZeroUsize),
}

impl EvictionPolicy {
    /// `None` (or zero) means unbounded
    pub fn from_capacity(capacity: Option<usize>) -> Self {
        match capacity.and_then(NonZeroUsize::new) {
            Some(capacity) => EvictionPolicy::Lru(capacity),
            None => EvictionPolicy::Unbounded,
        }
    }
}

/// `None` entries record specs without a mesh
type Entry = Option<Arc<MeshData>>;

enum Store {
    Unbounded(HashMap<String, Entry>),
    Lru(LruCache<String, Entry>),
}

impl Store {
    fn get(&mut self, key: &str) -> Option<&Entry> {
        match self {
            Store::Unbounded(map) => map.get(key),
            Store::Lru(cache) => cache.get(key),
        }
    }

    /// Returns true when an older entry was evicted to make room
    fn insert(&mut self, key: String, entry: Entry) -> bool {
        match self {
            Store::Unbounded(map) => {
                map.insert(key, entry);
                false
            }
            Store::Lru(cache) => matches!(cache.push(key.clone(), entry), Some((evicted, _)) if evicted != key),
        }
    }

    fn contains(&self, key: &str) -> bool {
        match self {
            Store::Unbounded(map) => map.contains_key(key),
            Store::Lru(cache) => cache.contains(key),
        }
    }

    fn len(&self) -> usize {
        match self {
            Store::Unbounded(map) => map.len(),
            Store::Lru(cache) => cache.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            Store::Unbounded(map) => map.clear(),
            Store::Lru(cache) => cache.clear(),
        }
    }
}

/// Statistics about cache performance and usage
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStatistics {
    /// Lookups answered from the cache
    pub cache_hits: usize,
    /// Lookups that had to go to the backend
    pub cache_misses: usize,
    /// Lookups that found the key already in flight
    pub pending_hits: usize,
    /// Entries dropped by the eviction policy
    pub evictions: usize,
    /// Backend calls issued
    pub fetches: usize,
}

impl CacheStatistics {
    pub fn hit_ratio(&self) -> f32 {
        let total = self.cache_hits + self.cache_misses + self.pending_hits;
        if total == 0 {
            0.0
        } else {
            (self.cache_hits + self.pending_hits) as f32 / total as f32
        }
    }
}

/// Answer to a mesh lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Cached; `None` when the server has no mesh for the spec
    Ready(Option<Arc<MeshData>>),
    /// Requested, reply not in yet
    Pending,
}

pub struct MeshCache {
    store: Store,
    pending: HashSet<String>,
    stats: CacheStatistics,
}

impl MeshCache {
    pub fn new(policy: EvictionPolicy) -> Self {
        let store = match policy {
            EvictionPolicy::Unbounded => Store::Unbounded(HashMap::new()),
            EvictionPolicy::Lru(capacity) => Store::Lru(LruCache::new(capacity)),
        };
        Self {
            store,
            pending: HashSet::new(),
            stats: CacheStatistics::default(),
        }
    }

    /// Look up `spec`, asking `fetch` for it unless it is cached or already in flight
    pub fn request(&mut self, spec: &Value, fetch: &mut dyn MeshFetch) -> (String, Lookup) {
        let key = mesh_key(spec);
        if let Some(entry) = self.store.get(&key) {
            let entry = entry.clone();
            self.stats.cache_hits += 1;
            return (key, Lookup::Ready(entry));
        }
        if self.pending.contains(&key) {
            self.stats.pending_hits += 1;
            return (key, Lookup::Pending);
        }
        self.stats.cache_misses += 1;
        self.stats.fetches += 1;
        self.pending.insert(key.clone());
        debug!("Fetching mesh for {}", key);
        fetch.fetch_mesh(&key, spec);
        (key, Lookup::Pending)
    }

    /// Store a reply. Returns what nodes waiting on `key` should show.
    pub fn resolve(&mut self, key: &str, mesh: Option<MeshData>) -> Option<Arc<MeshData>> {
        self.pending.remove(key);
        let entry = mesh.map(Arc::new);
        if self.store.insert(key.to_string(), entry.clone()) {
            self.stats.evictions += 1;
        }
        entry
    }

    /// Forget an in-flight key (e.g. after a failed request) so it can be requested again
    pub fn abandon(&mut self, key: &str) {
        self.pending.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.pending.clear();
    }

    pub fn get_statistics(&self) -> &CacheStatistics {
        &self.stats
    }
}

impl Default for MeshCache {
    fn default() -> Self {
        Self::new(EvictionPolicy::Unbounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use serde_json::json;

    fn triangle() -> MeshData {
        MeshData {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            faces: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn test_same_spec_fetches_once() {
        let mut cache = MeshCache::default();
        let mut calls = Vec::new();
        let mut fetch = |key: &str, _: &Value| calls.push(key.to_string());
        let spec = json!({"class": "Plane", "args": {"size": 2}});

        let (key, first) = cache.request(&spec, &mut fetch);
        assert_eq!(first, Lookup::Pending);
        let (_, second) = cache.request(&spec, &mut fetch);
        assert_eq!(second, Lookup::Pending);

        cache.resolve(&key, Some(triangle()));
        let (_, third) = cache.request(&spec, &mut fetch);
        assert!(matches!(third, Lookup::Ready(Some(_))));

        drop(fetch);
        assert_eq!(calls, vec![key]);
        let stats = cache.get_statistics();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.pending_hits, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[test]
    fn test_missing_mesh_is_cached() {
        let mut cache = MeshCache::default();
        let mut calls = 0;
        let mut fetch = |_: &str, _: &Value| calls += 1;
        let spec = json!({"class": "Nothing"});
        let (key, _) = cache.request(&spec, &mut fetch);
        assert_eq!(cache.resolve(&key, None), None);
        assert_eq!(cache.request(&spec, &mut fetch).1, Lookup::Ready(None));
        drop(fetch);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_lru_policy_evicts_oldest() {
        let mut cache = MeshCache::new(EvictionPolicy::from_capacity(Some(2)));
        let mut fetch = |_: &str, _: &Value| {};
        let keys: Vec<String> = (0..3)
            .map(|i| {
                let (key, _) = cache.request(&json!({"class": "Plane", "i": i}), &mut fetch);
                cache.resolve(&key, Some(triangle()));
                key
            })
            .collect();
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&keys[0]));
        assert!(cache.contains(&keys[2]));
        assert_eq!(cache.get_statistics().evictions, 1);
    }

    #[test]
    fn test_abandoned_key_can_be_requested_again() {
        let mut cache = MeshCache::default();
        let mut calls = 0;
        let mut fetch = |_: &str, _: &Value| calls += 1;
        let spec = json!({"class": "Plane"});
        let (key, _) = cache.request(&spec, &mut fetch);
        cache.abandon(&key);
        assert!(!cache.is_pending(&key));
        cache.request(&spec, &mut fetch);
        drop(fetch);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_policy_from_capacity() {
        assert_eq!(EvictionPolicy::from_capacity(None), EvictionPolicy::Unbounded);
        assert_eq!(EvictionPolicy::from_capacity(Some(0)), EvictionPolicy::Unbounded);
        assert!(matches!(EvictionPolicy::from_capacity(Some(8)), EvictionPolicy::Lru(_)));
    }
}
