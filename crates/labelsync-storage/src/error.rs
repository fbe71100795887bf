//! Errors returned by [`ClusterStore`](crate::ClusterStore) backends.

use std::fmt;

use labelsync_core::{CoreError, ResourceKind};

/// Store failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested object was not found.
    #[error("{kind} not found: {key}")]
    NotFound {
        kind: ResourceKind,
        key: String,
    },

    /// Attempted to create an object that already exists.
    #[error("{kind} already exists: {key}")]
    AlreadyExists {
        kind: ResourceKind,
        key: String,
    },

    /// A concurrent write won.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The object document is invalid.
    #[error("Invalid resource: {message}")]
    InvalidResource { message: String },

    /// The patch document could not be applied.
    #[error("Invalid patch: {message}")]
    InvalidPatch { message: String },

    /// A write addressed the "all clusters" sentinel.
    #[error("A specific cluster must be provided for {kind} writes, not the wildcard")]
    WildcardWrite { kind: ResourceKind },

    /// The store could not be reached.
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    /// An internal store error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn already_exists(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_patch(message: impl Into<String>) -> Self {
        Self::InvalidPatch {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Lost a race with another writer.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyExists { .. })
    }

    /// Returns `true` if repeating the same request may succeed later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Conflict | ErrorCategory::Infrastructure | ErrorCategory::Internal
        )
    }

    /// Coarse class used by callers to decide between retrying and dropping.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::InvalidResource { .. } => ErrorCategory::Validation,
            Self::InvalidPatch { .. } => ErrorCategory::Validation,
            Self::WildcardWrite { .. } => ErrorCategory::Validation,
            Self::Unavailable { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        Self::invalid_resource(err.to_string())
    }
}

/// See [`StorageError::category`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    /// The request itself is wrong; repeating it cannot succeed.
    Validation,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found(ResourceKind::ApiBinding, "org-b|c1");
        assert_eq!(err.to_string(), "APIBinding not found: org-b|c1");

        let err = StorageError::WildcardWrite {
            kind: ResourceKind::ApiBinding,
        };
        assert_eq!(
            err.to_string(),
            "A specific cluster must be provided for APIBinding writes, not the wildcard"
        );
    }

    #[test]
    fn test_error_predicates() {
        let err = StorageError::not_found(ResourceKind::ApiExport, "org-a|p");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());

        let err = StorageError::conflict("resource version changed");
        assert!(err.is_conflict());
        assert!(err.is_retryable());

        assert!(StorageError::unavailable("connection reset").is_retryable());
        assert!(!StorageError::invalid_patch("not an object").is_retryable());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found(ResourceKind::ApiExport, "org-a|p").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::already_exists(ResourceKind::ApiExport, "org-a|p").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::invalid_resource("bad data").category(),
            ErrorCategory::Validation
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
