use thiserror::Error;

use crate::key::KeyError;
use crate::resource::ResourceKind;

/// Core error types for labelsync operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid resource key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid resource data: {message}")]
    InvalidResource { message: String },

    #[error("Resource kind mismatch: expected {expected}, found {actual}")]
    KindMismatch {
        expected: ResourceKind,
        actual: ResourceKind,
    },
}

impl CoreError {
    /// Create a new InvalidResource error
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Create a new KindMismatch error
    pub fn kind_mismatch(expected: ResourceKind, actual: ResourceKind) -> Self {
        Self::KindMismatch { expected, actual }
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_resource("missing metadata");
        assert_eq!(err.to_string(), "Invalid resource data: missing metadata");

        let err = CoreError::kind_mismatch(ResourceKind::ApiBinding, ResourceKind::ApiExport);
        assert_eq!(
            err.to_string(),
            "Resource kind mismatch: expected APIBinding, found APIExport"
        );
    }

    #[test]
    fn test_key_error_conversion() {
        let err: CoreError = KeyError::format("a|b|c|d").into();
        assert!(matches!(err, CoreError::InvalidKey(_)));
    }
}
