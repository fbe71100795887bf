//! Resource key codec.
//!
//! Every object is identified by `(cluster, namespace?, name)`. The work queue
//! deduplicates on a single string token built from that triple:
//!
//! - Cluster-scoped: `cluster|name`
//! - Namespaced: `cluster|namespace|name`
//!
//! # Example
//!
//! ```
//! use labelsync_core::{LogicalCluster, ResourceKey};
//!
//! let key = ResourceKey::cluster_scoped(LogicalCluster::new("org-b"), "c1").unwrap();
//! assert_eq!(key.encode(), "org-b|c1");
//!
//! let decoded = ResourceKey::decode("org-b|c1").unwrap();
//! assert_eq!(decoded, key);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cluster::LogicalCluster;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '|';

/// Errors produced while building or decoding a resource key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The token does not have two or three `|`-separated segments.
    #[error("unexpected key format: {0:?}")]
    Format(String),

    /// A segment is empty or contains the separator.
    #[error("invalid {segment} segment in key: {value:?}")]
    InvalidSegment { segment: &'static str, value: String },
}

impl KeyError {
    pub fn format(token: impl Into<String>) -> Self {
        Self::Format(token.into())
    }

    fn invalid_segment(segment: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidSegment {
            segment,
            value: value.into(),
        }
    }
}

/// Identity of an object in the store.
///
/// Construction validates every segment, so a `ResourceKey` always encodes to
/// a token that decodes back to an equal key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    cluster: LogicalCluster,
    namespace: Option<String>,
    name: String,
}

impl ResourceKey {
    pub fn new(
        cluster: LogicalCluster,
        namespace: Option<String>,
        name: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let name = name.into();
        validate_segment("cluster", cluster.as_str())?;
        if let Some(ns) = namespace.as_deref() {
            validate_segment("namespace", ns)?;
        }
        validate_segment("name", &name)?;
        Ok(Self {
            cluster,
            namespace,
            name,
        })
    }

    pub fn cluster_scoped(
        cluster: LogicalCluster,
        name: impl Into<String>,
    ) -> Result<Self, KeyError> {
        Self::new(cluster, None, name)
    }

    pub fn namespaced(
        cluster: LogicalCluster,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, KeyError> {
        Self::new(cluster, Some(namespace.into()), name)
    }

    pub fn cluster(&self) -> &LogicalCluster {
        &self.cluster
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode into the queue token.
    pub fn encode(&self) -> String {
        let mut token = String::with_capacity(
            self.cluster.as_str().len()
                + self.namespace.as_deref().map_or(0, |ns| ns.len() + 1)
                + self.name.len()
                + 1,
        );
        token.push_str(self.cluster.as_str());
        token.push(KEY_SEPARATOR);
        if let Some(ns) = &self.namespace {
            token.push_str(ns);
            token.push(KEY_SEPARATOR);
        }
        token.push_str(&self.name);
        token
    }

    /// Decode a queue token.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Format` when the token does not have two or three
    /// segments, and `KeyError::InvalidSegment` when a segment is empty.
    pub fn decode(token: &str) -> Result<Self, KeyError> {
        let parts: Vec<&str> = token.split(KEY_SEPARATOR).collect();
        match parts.as_slice() {
            [cluster, name] => Self::cluster_scoped(LogicalCluster::new(*cluster), *name),
            [cluster, namespace, name] => {
                Self::namespaced(LogicalCluster::new(*cluster), *namespace, *name)
            }
            _ => Err(KeyError::format(token)),
        }
    }
}

fn validate_segment(segment: &'static str, value: &str) -> Result<(), KeyError> {
    if value.is_empty() || value.contains(KEY_SEPARATOR) {
        return Err(KeyError::invalid_segment(segment, value));
    }
    Ok(())
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ResourceKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_cluster_scoped() {
        let key = ResourceKey::cluster_scoped(LogicalCluster::new("root:org-a"), "export").unwrap();
        assert_eq!(key.encode(), "root:org-a|export");
        assert_eq!(key.namespace(), None);
    }

    #[test]
    fn test_encode_namespaced() {
        let key = ResourceKey::namespaced(LogicalCluster::new("org-b"), "default", "c1").unwrap();
        assert_eq!(key.encode(), "org-b|default|c1");
        assert_eq!(key.to_string(), "org-b|default|c1");
    }

    #[test]
    fn test_decode_reproduces_key() {
        for token in ["org-b|c1", "org-b|default|c1", "*|c1"] {
            let key = ResourceKey::decode(token).unwrap();
            assert_eq!(key.encode(), token);
        }
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert_eq!(ResourceKey::decode("c1"), Err(KeyError::format("c1")));
        assert_eq!(
            ResourceKey::decode("a|b|c|d"),
            Err(KeyError::format("a|b|c|d"))
        );
        assert!(matches!(
            ResourceKey::decode("org-b|"),
            Err(KeyError::InvalidSegment { segment: "name", .. })
        ));
        assert!(matches!(
            ResourceKey::decode("|c1"),
            Err(KeyError::InvalidSegment { segment: "cluster", .. })
        ));
        assert!(matches!(
            ResourceKey::decode("org-b||c1"),
            Err(KeyError::InvalidSegment { segment: "namespace", .. })
        ));
    }

    #[test]
    fn test_constructor_rejects_separator() {
        let err = ResourceKey::cluster_scoped(LogicalCluster::new("org|b"), "c1").unwrap_err();
        assert!(matches!(err, KeyError::InvalidSegment { segment: "cluster", .. }));
    }

    #[test]
    fn test_serde_as_token() {
        let key = ResourceKey::cluster_scoped(LogicalCluster::new("org-c"), "c2").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"org-c|c2\"");
        let back: ResourceKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);

        assert!(serde_json::from_str::<ResourceKey>("\"no-separator\"").is_err());
    }
}
