//! Indexed read-through cache fed by an informer.
//!
//! ## Layout
//!
//! - **Items**: encoded key → latest object seen on the change stream
//! - **Indices**: index name → index key → set of encoded item keys
//!
//! Index entries are re-derived on every upsert (stale entries removed first)
//! and dropped on removal, so `by_index` always agrees with the items.
//!
//! Only the owning informer mutates the cache; workers and the event router
//! read it through a shared `Arc`.

pub mod index;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use labelsync_core::{ClusterObject, KeyError, LogicalCluster, ResourceKey};
use parking_lot::RwLock;

use crate::error::ControllerError;

pub use index::{API_BINDINGS_BY_API_EXPORT, IndexFunc, api_bindings_by_api_export};

struct CacheState<T> {
    items: HashMap<String, T>,
    indices: HashMap<&'static str, HashMap<String, BTreeSet<String>>>,
}

/// Local copy of every object of one kind, across all clusters.
pub struct ResourceCache<T: ClusterObject> {
    state: RwLock<CacheState<T>>,
    indexers: HashMap<&'static str, IndexFunc<T>>,
}

impl<T: ClusterObject> ResourceCache<T> {
    /// Create an empty cache without indexers.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState {
                items: HashMap::new(),
                indices: HashMap::new(),
            }),
            indexers: HashMap::new(),
        }
    }

    /// Register a named indexer. Indexers are fixed once the cache is shared.
    pub fn with_indexer(
        mut self,
        name: &'static str,
        index: impl Fn(&T) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.indexers.insert(name, Arc::new(index));
        self.state.get_mut().indices.insert(name, HashMap::new());
        self
    }

    /// Point lookup by key.
    pub fn get(&self, key: &ResourceKey) -> Option<T> {
        self.state.read().items.get(&key.encode()).cloned()
    }

    /// Point lookup by the parts of a key. Parts that cannot form a valid key
    /// never match.
    pub fn get_in(
        &self,
        cluster: &LogicalCluster,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<T> {
        let key = ResourceKey::new(cluster.clone(), namespace.map(str::to_string), name).ok()?;
        self.get(&key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.state.read().items.contains_key(&key.encode())
    }

    /// Every object whose indexer `index_name` yields `index_key`.
    pub fn by_index(&self, index_name: &str, index_key: &str) -> Result<Vec<T>, ControllerError> {
        let state = self.state.read();
        let index = state
            .indices
            .get(index_name)
            .ok_or_else(|| ControllerError::UnknownIndex(index_name.to_string()))?;
        Ok(index
            .get(index_key)
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| state.items.get(key).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Insert or replace an object, returning the previous version.
    pub fn upsert(&self, object: T) -> Result<Option<T>, KeyError> {
        let key = object.key()?.encode();
        let mut state = self.state.write();
        let previous = state.items.remove(&key);
        if let Some(old) = &previous {
            self.unindex(&mut state, &key, old);
        }
        self.index(&mut state, &key, &object);
        state.items.insert(key, object);
        Ok(previous)
    }

    /// Remove an object, returning it if it was cached.
    pub fn remove(&self, key: &ResourceKey) -> Option<T> {
        let key = key.encode();
        let mut state = self.state.write();
        let removed = state.items.remove(&key)?;
        self.unindex(&mut state, &key, &removed);
        Some(removed)
    }

    /// Replace the whole content with a fresh listing.
    ///
    /// Returns the cached objects that are absent from `objects`. Objects
    /// whose key cannot be derived are skipped.
    pub fn replace(&self, objects: Vec<T>) -> Vec<T> {
        let mut state = self.state.write();
        let mut previous = std::mem::take(&mut state.items);
        for index in state.indices.values_mut() {
            index.clear();
        }
        for object in objects {
            let Ok(key) = object.key().map(|k| k.encode()) else {
                continue;
            };
            previous.remove(&key);
            self.index(&mut state, &key, &object);
            state.items.insert(key, object);
        }
        previous.into_values().collect()
    }

    /// Snapshot of every cached object.
    pub fn list(&self) -> Vec<T> {
        self.state.read().items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().items.is_empty()
    }

    fn index(&self, state: &mut CacheState<T>, key: &str, object: &T) {
        for (name, indexer) in &self.indexers {
            let index = state.indices.entry(*name).or_default();
            for index_key in indexer(object) {
                index.entry(index_key).or_default().insert(key.to_string());
            }
        }
    }

    fn unindex(&self, state: &mut CacheState<T>, key: &str, object: &T) {
        for (name, indexer) in &self.indexers {
            let Some(index) = state.indices.get_mut(name) else {
                continue;
            };
            for index_key in indexer(object) {
                if let Some(keys) = index.get_mut(&index_key) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.remove(&index_key);
                    }
                }
            }
        }
    }
}

impl<T: ClusterObject> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ClusterObject> std::fmt::Debug for ResourceCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut indexers: Vec<_> = self.indexers.keys().collect();
        indexers.sort();
        f.debug_struct("ResourceCache")
            .field("kind", &T::KIND)
            .field("len", &self.len())
            .field("indexers", &indexers)
            .finish()
    }
}
