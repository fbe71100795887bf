//! In-memory cluster store.
//!
//! Keeps every object as a JSON document in a `DashMap` keyed by kind and
//! encoded resource key. Merge patches are applied with `json_patch::merge`,
//! which implements RFC 7386. Used for tests and for embedding the controller
//! without a remote store.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use labelsync_core::{LogicalCluster, ObjectMeta, ResourceKey, ResourceKind};
use serde_json::Value;
use tracing::debug;

use crate::error::StorageError;
use crate::traits::ClusterStore;
use crate::types::{PatchType, StoredObject};

type StorageKey = (ResourceKind, String);

fn make_storage_key(kind: ResourceKind, key: &ResourceKey) -> StorageKey {
    (kind, key.encode())
}

/// In-memory store backend.
#[derive(Debug)]
pub struct InMemoryStore {
    objects: DashMap<StorageKey, StoredObject>,
    /// Monotonic revision counter shared by all kinds.
    version_counter: AtomicU64,
    /// Number of upcoming patch requests to fail with `Unavailable`.
    injected_patch_failures: AtomicU32,
    /// Number of patch requests that reached the backend.
    patch_requests: AtomicU64,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            version_counter: AtomicU64::new(1),
            injected_patch_failures: AtomicU32::new(0),
            patch_requests: AtomicU64::new(0),
        }
    }

    /// Makes the next `count` patch requests fail with a transient error.
    pub fn fail_next_patches(&self, count: u32) {
        self.injected_patch_failures.store(count, Ordering::SeqCst);
    }

    /// Number of patch requests received, failed ones included.
    pub fn patch_requests(&self) -> u64 {
        self.patch_requests.load(Ordering::SeqCst)
    }

    /// Number of stored objects across all kinds.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn next_version(&self) -> u64 {
        self.version_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn take_injected_failure(&self) -> bool {
        self.injected_patch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Validates the identity of a document.
    ///
    /// The revision is stamped later, while the entry is locked, so revisions
    /// of one object grow in the order its writes land.
    fn identify(&self, kind: ResourceKind, object: &Value) -> Result<ResourceKey, StorageError> {
        if !object.is_object() {
            return Err(StorageError::invalid_resource("object must be a JSON object"));
        }
        let meta = ObjectMeta::from_object(object)?;
        if meta.cluster.is_wildcard() {
            return Err(StorageError::WildcardWrite { kind });
        }
        meta.key().map_err(|e| StorageError::invalid_resource(e.to_string()))
    }

    fn stamp(&self, kind: ResourceKind, key: ResourceKey, mut object: Value) -> StoredObject {
        let resource_version = self.next_version();
        if let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert("resourceVersion".to_string(), Value::from(resource_version));
        }
        StoredObject {
            kind,
            key,
            resource_version,
            object,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterStore for InMemoryStore {
    async fn get(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> Result<Option<StoredObject>, StorageError> {
        Ok(self
            .objects
            .get(&make_storage_key(kind, key))
            .map(|entry| entry.value().clone()))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        cluster: &LogicalCluster,
    ) -> Result<Vec<StoredObject>, StorageError> {
        let mut objects: Vec<StoredObject> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == kind)
            .filter(|entry| cluster.is_wildcard() || entry.value().key.cluster() == cluster)
            .map(|entry| entry.value().clone())
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn create(
        &self,
        kind: ResourceKind,
        object: &Value,
    ) -> Result<StoredObject, StorageError> {
        let key = self.identify(kind, object)?;

        match self.objects.entry(make_storage_key(kind, &key)) {
            Entry::Occupied(_) => Err(StorageError::already_exists(kind, key.encode())),
            Entry::Vacant(slot) => {
                let stored = self.stamp(kind, key, object.clone());
                slot.insert(stored.clone());
                debug!(kind = %kind, key = %stored.key, "Created object");
                Ok(stored)
            }
        }
    }

    async fn update(
        &self,
        kind: ResourceKind,
        object: &Value,
    ) -> Result<StoredObject, StorageError> {
        let key = self.identify(kind, object)?;

        match self.objects.get_mut(&make_storage_key(kind, &key)) {
            Some(mut entry) => {
                let stored = self.stamp(kind, key, object.clone());
                *entry = stored.clone();
                debug!(kind = %kind, key = %stored.key, "Updated object");
                Ok(stored)
            }
            None => Err(StorageError::not_found(kind, key.encode())),
        }
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
        patch_type: PatchType,
        body: &[u8],
    ) -> Result<StoredObject, StorageError> {
        self.patch_requests.fetch_add(1, Ordering::SeqCst);

        if key.cluster().is_wildcard() {
            return Err(StorageError::WildcardWrite { kind });
        }
        if self.take_injected_failure() {
            return Err(StorageError::unavailable("injected patch failure"));
        }

        let patch: Value = match patch_type {
            PatchType::Merge => serde_json::from_slice(body)
                .map_err(|e| StorageError::invalid_patch(e.to_string()))?,
        };
        if !patch.is_object() {
            return Err(StorageError::invalid_patch("merge patch must be a JSON object"));
        }

        let storage_key = make_storage_key(kind, key);
        let mut entry = self
            .objects
            .get_mut(&storage_key)
            .ok_or_else(|| StorageError::not_found(kind, key.encode()))?;

        let mut patched = entry.object.clone();
        json_patch::merge(&mut patched, &patch);

        let meta = ObjectMeta::from_object(&patched)
            .map_err(|e| StorageError::invalid_patch(e.to_string()))?;
        if meta.key().ok().as_ref() != Some(key) {
            return Err(StorageError::invalid_patch("patch must not change object identity"));
        }

        let stored = self.stamp(kind, key.clone(), patched);
        *entry = stored.clone();
        debug!(
            kind = %kind,
            key = %key,
            resource_version = stored.resource_version,
            "Patched object"
        );
        Ok(stored)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> Result<StoredObject, StorageError> {
        if key.cluster().is_wildcard() {
            return Err(StorageError::WildcardWrite { kind });
        }
        self.objects
            .remove(&make_storage_key(kind, key))
            .map(|(_, stored)| {
                debug!(kind = %kind, key = %key, "Deleted object");
                stored
            })
            .ok_or_else(|| StorageError::not_found(kind, key.encode()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
