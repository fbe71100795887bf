//! Writes label patches to the store.

use async_trait::async_trait;
use labelsync_core::{ResourceKey, ResourceKind};
use labelsync_storage::{DynStore, PatchType};
use tracing::{debug, trace};

use crate::error::ControllerError;
use crate::patch::LabelPatch;

/// Applies a computed patch to the binding it was computed for.
#[async_trait]
pub trait Committer: Send + Sync {
    /// An empty patch performs no write. Store errors are returned unchanged.
    async fn apply(&self, key: &ResourceKey, patch: &LabelPatch) -> Result<(), ControllerError>;
}

/// Sends label patches as JSON Merge Patch requests.
pub struct MergePatchCommitter {
    store: DynStore,
}

impl MergePatchCommitter {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Committer for MergePatchCommitter {
    async fn apply(&self, key: &ResourceKey, patch: &LabelPatch) -> Result<(), ControllerError> {
        if patch.is_empty() {
            trace!(key = %key, "Labels already in sync");
            return Ok(());
        }
        if key.cluster().is_wildcard() {
            return Err(ControllerError::wildcard_write(key));
        }

        let body = patch.to_bytes()?;
        let stored = self
            .store
            .patch(ResourceKind::ApiBinding, key, PatchType::Merge, &body)
            .await?;
        debug!(
            key = %key,
            resource_version = stored.resource_version,
            content_type = PatchType::Merge.content_type(),
            "Patched APIBinding labels"
        );
        Ok(())
    }
}
