//! EventedStore - A store wrapper that emits watch events after writes.
//!
//! This wrapper delegates all operations to an inner store while emitting
//! events to a broadcaster after successful writes. Informers subscribe to
//! the broadcaster to keep their caches current.
//!
//! # Example
//!
//! ```ignore
//! use labelsync_core::events::EventBroadcaster;
//! use labelsync_storage::{EventedStore, InMemoryStore};
//!
//! let broadcaster = EventBroadcaster::new_shared();
//! let store = EventedStore::new(InMemoryStore::new(), broadcaster);
//!
//! // Subscribers of the broadcaster now see an "added" event
//! store.create(ResourceKind::ApiExport, &export_json).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use labelsync_core::events::{EventBroadcaster, ResourceEvent, ResourceEventType};
use labelsync_core::{LogicalCluster, ResourceKey, ResourceKind};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::traits::ClusterStore;
use crate::types::{PatchType, StoredObject};

/// A store wrapper that emits events after successful writes.
///
/// Events are emitted **after** the write succeeds, so every event corresponds
/// to a state the inner store actually holds. Writes and their events share
/// one critical section: subscribers receive events in the order the writes
/// landed, and the last event for an object matches what the store holds.
pub struct EventedStore<S: ClusterStore> {
    inner: S,
    broadcaster: Arc<EventBroadcaster>,
    write_order: Mutex<()>,
}

impl<S: ClusterStore> EventedStore<S> {
    /// Create a new evented store wrapper.
    pub fn new(inner: S, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            inner,
            broadcaster,
            write_order: Mutex::new(()),
        }
    }

    /// Get a reference to the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a reference to the broadcaster.
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    fn emit(&self, event_type: ResourceEventType, stored: &StoredObject) {
        if !self.broadcaster.has_subscribers() {
            return;
        }
        let event = ResourceEvent::new(
            event_type,
            stored.kind,
            stored.key.clone(),
            Some(stored.object.clone()),
        )
        .with_version(stored.resource_version);
        let count = self.broadcaster.send(event);
        debug!(
            kind = %stored.kind,
            key = %stored.key,
            event_type = %event_type,
            subscribers = count,
            "Emitted resource event"
        );
    }
}

#[async_trait]
impl<S: ClusterStore> ClusterStore for EventedStore<S> {
    async fn get(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> Result<Option<StoredObject>, StorageError> {
        self.inner.get(kind, key).await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        cluster: &LogicalCluster,
    ) -> Result<Vec<StoredObject>, StorageError> {
        self.inner.list(kind, cluster).await
    }

    async fn create(
        &self,
        kind: ResourceKind,
        object: &Value,
    ) -> Result<StoredObject, StorageError> {
        let _ordered = self.write_order.lock().await;
        let stored = self.inner.create(kind, object).await?;
        self.emit(ResourceEventType::Added, &stored);
        Ok(stored)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        object: &Value,
    ) -> Result<StoredObject, StorageError> {
        let _ordered = self.write_order.lock().await;
        let stored = self.inner.update(kind, object).await?;
        self.emit(ResourceEventType::Updated, &stored);
        Ok(stored)
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
        patch_type: PatchType,
        body: &[u8],
    ) -> Result<StoredObject, StorageError> {
        let _ordered = self.write_order.lock().await;
        let stored = self.inner.patch(kind, key, patch_type, body).await?;
        self.emit(ResourceEventType::Updated, &stored);
        Ok(stored)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> Result<StoredObject, StorageError> {
        let _ordered = self.write_order.lock().await;
        let last = self.inner.delete(kind, key).await?;
        self.emit(ResourceEventType::Deleted, &last);
        Ok(last)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use labelsync_core::{ApiExport, ClusterObject};

    fn evented() -> EventedStore<InMemoryStore> {
        EventedStore::new(InMemoryStore::new(), EventBroadcaster::new_shared())
    }

    #[tokio::test]
    async fn test_write_events_follow_successful_writes() {
        let store = evented();
        let mut rx = store.broadcaster().subscribe();
        let export = ApiExport::new("org-a", "p").with_label("sync", "");
        let key = export.key().unwrap();

        store
            .create(ResourceKind::ApiExport, &export.to_value().unwrap())
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, ResourceEventType::Added);
        assert_eq!(event.key, key);
        assert!(event.resource_version.is_some());

        store
            .patch(
                ResourceKind::ApiExport,
                &key,
                PatchType::Merge,
                br#"{"metadata":{"labels":{"sync":null}}}"#,
            )
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, ResourceEventType::Updated);

        store.delete(ResourceKind::ApiExport, &key).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, ResourceEventType::Deleted);
        let last = event.resource.unwrap();
        assert_eq!(last["metadata"]["name"], "p");
    }

    #[tokio::test]
    async fn test_failed_writes_emit_nothing() {
        let store = evented();
        let mut rx = store.broadcaster().subscribe();
        let key = ApiExport::new("org-a", "missing").key().unwrap();

        let err = store.delete(ResourceKind::ApiExport, &key).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reads_delegate() {
        let store = evented();
        let export = ApiExport::new("org-a", "p");
        store
            .create(ResourceKind::ApiExport, &export.to_value().unwrap())
            .await
            .unwrap();

        let listed = store
            .list(ResourceKind::ApiExport, &LogicalCluster::wildcard())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_publish_in_write_order() {
        let store = Arc::new(EventedStore::new(
            InMemoryStore::new(),
            Arc::new(EventBroadcaster::with_capacity(4096)),
        ));
        let mut rx = store.broadcaster().subscribe();
        let export = ApiExport::new("org-a", "p");
        let key = export.key().unwrap();
        store
            .create(ResourceKind::ApiExport, &export.to_value().unwrap())
            .await
            .unwrap();

        let mut writers = tokio::task::JoinSet::new();
        for i in 0..8 {
            let store = store.clone();
            writers.spawn(async move {
                for n in 0..200 {
                    let export =
                        ApiExport::new("org-a", "p").with_label("writer", format!("{i}-{n}"));
                    store
                        .update(ResourceKind::ApiExport, &export.to_value().unwrap())
                        .await
                        .unwrap();
                }
            });
        }
        while let Some(joined) = writers.join_next().await {
            joined.unwrap();
        }

        let mut versions = Vec::new();
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            versions.push(event.resource_version.unwrap());
            last = event.resource;
        }
        assert_eq!(versions.len(), 1 + 8 * 200);
        assert!(versions.windows(2).all(|w| w[0] < w[1]), "events out of write order");

        let stored = store.get(ResourceKind::ApiExport, &key).await.unwrap().unwrap();
        assert_eq!(versions.last().copied(), Some(stored.resource_version));
        assert_eq!(last, Some(stored.object));
    }
}
