//! Resource model for the parent (`APIExport`) and child (`APIBinding`) kinds.
//!
//! Objects travel through the store as JSON documents shaped like
//!
//! ```json
//! {
//!   "metadata": { "cluster": "org-b", "name": "c1", "labels": { "sync": "" } },
//!   "spec": { "reference": { "workspace": { "path": "org-a", "exportName": "p" } } }
//! }
//! ```
//!
//! and are decoded into the typed structs below by the informer cache.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::cluster::LogicalCluster;
use crate::error::{CoreError, Result};
use crate::key::{KeyError, ResourceKey};

/// Label set of an object. Keys are unique; ordering is stable for patches.
pub type Labels = BTreeMap<String, String>;

/// Kinds of objects the controller watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "APIExport")]
    ApiExport,
    #[serde(rename = "APIBinding")]
    ApiBinding,
}

impl ResourceKind {
    /// Returns the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ApiExport => "APIExport",
            ResourceKind::ApiBinding => "APIBinding",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata shared by every object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub cluster: LogicalCluster,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
    /// Assigned by the store; increases on every write.
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn new(cluster: impl Into<LogicalCluster>, name: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: None,
            name: name.into(),
            labels: Labels::new(),
            resource_version: 0,
        }
    }

    pub fn key(&self) -> std::result::Result<ResourceKey, KeyError> {
        ResourceKey::new(self.cluster.clone(), self.namespace.clone(), self.name.clone())
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// Extract and decode the `metadata` field of a raw object document.
    pub fn from_object(object: &serde_json::Value) -> Result<Self> {
        let metadata = object
            .get("metadata")
            .ok_or_else(|| CoreError::invalid_resource("object has no metadata"))?;
        Ok(ObjectMeta::deserialize(metadata)?)
    }
}

/// Common behaviour of the typed objects held in informer caches.
pub trait ClusterObject: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// The kind stored in the backing store.
    const KIND: ResourceKind;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> std::result::Result<ResourceKey, KeyError> {
        self.metadata().key()
    }

    fn labels(&self) -> &Labels {
        &self.metadata().labels
    }

    /// Decode from a raw JSON document.
    fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encode into a raw JSON document.
    fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ============================================================================
// APIExport
// ============================================================================

/// Parent kind. Its marker label is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiExport {
    pub metadata: ObjectMeta,
}

impl ApiExport {
    pub fn new(cluster: impl Into<LogicalCluster>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(cluster, name),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }
}

impl ClusterObject for ApiExport {
    const KIND: ResourceKind = ResourceKind::ApiExport;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

// ============================================================================
// APIBinding
// ============================================================================

/// Child kind. Carries a cross-cluster reference to exactly one export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiBinding {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ApiBindingSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiBindingSpec {
    #[serde(default)]
    pub reference: ExportReference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReference {
    /// Unset for bindings whose export is not addressed by workspace path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceExportReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceExportReference {
    /// Workspace path of the cluster holding the export.
    pub path: String,
    pub export_name: String,
}

impl WorkspaceExportReference {
    /// The logical cluster the reference points into.
    pub fn cluster(&self) -> LogicalCluster {
        LogicalCluster::from_path(&self.path)
    }

    /// Key of the referenced export.
    pub fn export_key(&self) -> std::result::Result<ResourceKey, KeyError> {
        ResourceKey::cluster_scoped(self.cluster(), self.export_name.clone())
    }
}

impl ApiBinding {
    pub fn new(cluster: impl Into<LogicalCluster>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(cluster, name),
            spec: ApiBindingSpec::default(),
        }
    }

    pub fn with_reference(
        mut self,
        path: impl Into<String>,
        export_name: impl Into<String>,
    ) -> Self {
        self.spec.reference.workspace = Some(WorkspaceExportReference {
            path: path.into(),
            export_name: export_name.into(),
        });
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn workspace_reference(&self) -> Option<&WorkspaceExportReference> {
        self.spec.reference.workspace.as_ref()
    }
}

impl ClusterObject for ApiBinding {
    const KIND: ResourceKind = ResourceKind::ApiBinding;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
