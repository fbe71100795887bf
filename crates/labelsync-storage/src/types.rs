//! Storage types for the cluster store abstraction.

use labelsync_core::{ClusterObject, CoreError, ResourceKey, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;

/// An object as stored in the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    /// Kind of the object.
    pub kind: ResourceKind,
    /// Identity of the object.
    pub key: ResourceKey,
    /// Revision assigned by the store on the last write.
    pub resource_version: u64,
    /// The full object document, `metadata.resourceVersion` included.
    pub object: Value,
}

impl StoredObject {
    /// Decode the stored document into a typed object.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidResource` if the kind does not match or
    /// the document does not decode.
    pub fn decode<T: ClusterObject>(&self) -> Result<T, StorageError> {
        if self.kind != T::KIND {
            return Err(CoreError::kind_mismatch(T::KIND, self.kind).into());
        }
        Ok(T::from_value(self.object.clone())?)
    }
}

/// Content type of a patch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchType {
    /// JSON Merge Patch (RFC 7386): present keys are set, `null` removes.
    Merge,
}

impl PatchType {
    /// The HTTP content type a remote store expects for this patch type.
    pub fn content_type(&self) -> &'static str {
        match self {
            PatchType::Merge => "application/merge-patch+json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelsync_core::{ApiBinding, ApiExport, LogicalCluster};

    #[test]
    fn test_decode_checks_kind() {
        let binding = ApiBinding::new("org-b", "c1").with_reference("org-a", "p");
        let stored = StoredObject {
            kind: ResourceKind::ApiBinding,
            key: ResourceKey::cluster_scoped(LogicalCluster::new("org-b"), "c1").unwrap(),
            resource_version: 1,
            object: binding.to_value().unwrap(),
        };

        let decoded: ApiBinding = stored.decode().unwrap();
        assert_eq!(decoded, binding);

        let err = stored.decode::<ApiExport>().unwrap_err();
        assert!(matches!(err, StorageError::InvalidResource { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid resource: Resource kind mismatch: expected APIExport, found APIBinding"
        );
    }

    #[test]
    fn test_merge_content_type() {
        assert_eq!(PatchType::Merge.content_type(), "application/merge-patch+json");
    }
}
