//! Controller error types.

use labelsync_core::{KeyError, ResourceKey};
use labelsync_storage::{ErrorCategory, StorageError};

/// Errors raised while reconciling a queue key.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The queue key does not decode.
    #[error("Invalid queue key: {0}")]
    InvalidKey(#[from] KeyError),

    /// The remote store rejected or failed a request.
    #[error("Store error: {0}")]
    Storage(#[from] StorageError),

    /// A patch body or cached object could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A write was addressed to every cluster at once.
    #[error("Refusing to write {key}: a specific cluster is required")]
    WildcardWrite { key: String },

    /// The cache has no indexer with this name.
    #[error("Unknown index: {0}")]
    UnknownIndex(String),
}

impl ControllerError {
    /// Returns `true` when the target object is gone; such errors need no retry.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_not_found())
    }

    /// Returns `true` when retrying the same key cannot succeed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::InvalidKey(_)
            | Self::Serialization(_)
            | Self::WildcardWrite { .. }
            | Self::UnknownIndex(_) => true,
            Self::Storage(err) => err.category() == ErrorCategory::Validation,
        }
    }

    /// Returns `true` when the key should be requeued with backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !self.is_not_found() && !self.is_terminal()
    }

    pub fn wildcard_write(key: &ResourceKey) -> Self {
        Self::WildcardWrite { key: key.encode() }
    }
}
