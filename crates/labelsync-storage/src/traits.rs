//! Store traits.

use async_trait::async_trait;
use labelsync_core::{LogicalCluster, ResourceKey, ResourceKind};
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{PatchType, StoredObject};

/// Remote, eventually consistent object store partitioned by logical cluster.
///
/// Every write is scoped to one concrete cluster; the wildcard cluster is only
/// accepted by [`ClusterStore::list`]. Implementations must be thread-safe.
///
/// # Example
///
/// ```ignore
/// use labelsync_storage::{ClusterStore, PatchType};
///
/// async fn label(store: &dyn ClusterStore, key: &ResourceKey) -> Result<(), StorageError> {
///     let body = br#"{"metadata":{"labels":{"sync":""}}}"#;
///     store.patch(ResourceKind::ApiBinding, key, PatchType::Merge, body).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ClusterStore: Send + Sync {
    // ==================== Reads ====================

    /// Reads an object by key.
    ///
    /// Returns `None` if the object does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing objects.
    async fn get(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> Result<Option<StoredObject>, StorageError>;

    /// Lists all objects of a kind in one cluster, or in every cluster when
    /// `cluster` is the wildcard.
    async fn list(
        &self,
        kind: ResourceKind,
        cluster: &LogicalCluster,
    ) -> Result<Vec<StoredObject>, StorageError>;

    // ==================== Writes ====================

    /// Creates a new object. Identity is taken from `object.metadata`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if an object with the same key exists.
    /// Returns `StorageError::WildcardWrite` if the object names the wildcard cluster.
    async fn create(&self, kind: ResourceKind, object: &Value)
    -> Result<StoredObject, StorageError>;

    /// Replaces an existing object.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    async fn update(&self, kind: ResourceKind, object: &Value)
    -> Result<StoredObject, StorageError>;

    /// Applies a partial update to an existing object.
    ///
    /// Keys absent from the patch are left untouched, so concurrent edits to
    /// other fields are preserved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    /// Returns `StorageError::InvalidPatch` if the body is not a valid patch.
    /// Returns `StorageError::WildcardWrite` if the key names the wildcard cluster.
    async fn patch(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
        patch_type: PatchType,
        body: &[u8],
    ) -> Result<StoredObject, StorageError>;

    /// Deletes an object and returns its last state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    async fn delete(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> Result<StoredObject, StorageError>;

    // ==================== Metadata ====================

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
