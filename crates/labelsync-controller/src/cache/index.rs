//! Secondary index functions.

use std::sync::Arc;

use labelsync_core::ApiBinding;

/// Derives the index keys of an object. An empty result leaves it unindexed.
pub type IndexFunc<T> = Arc<dyn Fn(&T) -> Vec<String> + Send + Sync>;

/// Index of APIBindings by the encoded key of the APIExport they reference.
pub const API_BINDINGS_BY_API_EXPORT: &str = "apibindings-by-apiexport";

/// Maps a binding to `path|exportName` of its referenced export.
///
/// Bindings without a workspace reference, or with a reference that cannot
/// form a key, are not indexed.
pub fn api_bindings_by_api_export(binding: &ApiBinding) -> Vec<String> {
    binding
        .workspace_reference()
        .and_then(|reference| reference.export_key().ok())
        .map(|key| vec![key.encode()])
        .unwrap_or_default()
}
