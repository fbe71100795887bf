//! Logical cluster names.
//!
//! A logical cluster is an isolated partition of the shared store. Objects in
//! different logical clusters are addressed independently, even when they share
//! a name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel cluster name meaning "all logical clusters".
///
/// Only valid for read-side aggregate queries such as a list across every
/// partition. Writes must always target a concrete cluster.
pub const WILDCARD: &str = "*";

/// Name of a logical cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalCluster(String);

impl LogicalCluster {
    /// Create a cluster name. No validation is performed here; key
    /// construction rejects names that cannot be encoded.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The "all clusters" sentinel.
    pub fn wildcard() -> Self {
        Self(WILDCARD.to_string())
    }

    /// Resolve a workspace path to the logical cluster it names.
    ///
    /// Paths and cluster names share one namespace (`root:org:team`), so the
    /// resolution is the identity. It stays a separate step so callers never
    /// conflate a reference path with the cluster of the referencing object.
    pub fn from_path(path: &str) -> Self {
        Self::new(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LogicalCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalCluster {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LogicalCluster {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for LogicalCluster {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
