//! Decides the label patch for one APIBinding.
//!
//! Everything here reads the local caches only; no remote calls are made.

use std::sync::Arc;

use labelsync_core::{ApiBinding, ApiExport, ResourceKey};
use tracing::trace;

use crate::cache::ResourceCache;
use crate::error::ControllerError;
use crate::patch::LabelPatch;

/// Patch to apply to one binding. May be empty when already in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub key: ResourceKey,
    pub patch: LabelPatch,
}

/// Compare marker presence on the export and the binding.
///
/// Only presence matters; the value written is always `""`.
pub fn compute_label_patch(export: &ApiExport, binding: &ApiBinding, marker: &str) -> LabelPatch {
    let mut patch = LabelPatch::new();
    match (export.metadata.has_label(marker), binding.metadata.has_label(marker)) {
        (true, false) => patch.set(marker, ""),
        (false, true) => patch.remove(marker),
        _ => {}
    }
    patch
}

pub struct LabelReconciler {
    bindings: Arc<ResourceCache<ApiBinding>>,
    exports: Arc<ResourceCache<ApiExport>>,
    marker_label: String,
}

impl LabelReconciler {
    pub fn new(
        bindings: Arc<ResourceCache<ApiBinding>>,
        exports: Arc<ResourceCache<ApiExport>>,
        marker_label: impl Into<String>,
    ) -> Self {
        Self {
            bindings,
            exports,
            marker_label: marker_label.into(),
        }
    }

    pub fn marker_label(&self) -> &str {
        &self.marker_label
    }

    /// Reconcile the binding named by a queue token.
    ///
    /// Returns `None` when there is nothing to compare: the binding is gone,
    /// it has no workspace reference, or the export is not cached.
    pub fn reconcile(&self, token: &str) -> Result<Option<Reconciliation>, ControllerError> {
        let key = ResourceKey::decode(token)?;

        let Some(binding) = self.bindings.get(&key) else {
            trace!(key = %key, "APIBinding no longer exists");
            return Ok(None);
        };

        let Some(reference) = binding.workspace_reference() else {
            trace!(key = %key, "APIBinding has no workspace reference");
            return Ok(None);
        };

        let cluster = reference.cluster();
        let Some(export) = self.exports.get_in(&cluster, None, &reference.export_name) else {
            trace!(
                key = %key,
                export_cluster = %cluster,
                export_name = %reference.export_name,
                "Referenced APIExport not found"
            );
            return Ok(None);
        };

        let patch = compute_label_patch(&export, &binding, &self.marker_label);
        Ok(Some(Reconciliation { key, patch }))
    }
}
