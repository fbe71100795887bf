//! Change notification types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::key::ResourceKey;
use crate::resource::ResourceKind;

/// Type of change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceEventType {
    /// Object was created
    Added,
    /// Object was modified
    Updated,
    /// Object was removed
    Deleted,
}

impl ResourceEventType {
    /// Returns the string representation of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceEventType::Added => "added",
            ResourceEventType::Updated => "updated",
            ResourceEventType::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ResourceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A change to one object in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEvent {
    /// Type of change (added, updated, deleted)
    pub event_type: ResourceEventType,
    /// Kind of the changed object
    pub kind: ResourceKind,
    /// Identity of the changed object
    pub key: ResourceKey,
    /// Store revision after the change, if known
    pub resource_version: Option<u64>,
    /// Full object after the change. For deletions this is the last known
    /// state, or `None` when the final state is unknown.
    pub resource: Option<serde_json::Value>,
    /// Timestamp of the event
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ResourceEvent {
    /// Create a new resource event.
    pub fn new(
        event_type: ResourceEventType,
        kind: ResourceKind,
        key: ResourceKey,
        resource: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            kind,
            key,
            resource_version: None,
            resource,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Create an "added" event.
    pub fn added(kind: ResourceKind, key: ResourceKey, resource: serde_json::Value) -> Self {
        Self::new(ResourceEventType::Added, kind, key, Some(resource))
    }

    /// Create an "updated" event.
    pub fn updated(kind: ResourceKind, key: ResourceKey, resource: serde_json::Value) -> Self {
        Self::new(ResourceEventType::Updated, kind, key, Some(resource))
    }

    /// Create a "deleted" event.
    pub fn deleted(
        kind: ResourceKind,
        key: ResourceKey,
        last_known: Option<serde_json::Value>,
    ) -> Self {
        Self::new(ResourceEventType::Deleted, kind, key, last_known)
    }

    /// Set the resource version.
    pub fn with_version(mut self, resource_version: u64) -> Self {
        self.resource_version = Some(resource_version);
        self
    }

    /// Check if this event concerns the given kind.
    pub fn matches_kind(&self, kind: ResourceKind) -> bool {
        self.kind == kind
    }
}
