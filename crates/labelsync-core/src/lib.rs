//! # labelsync-core
//!
//! Shared vocabulary for the labelsync workspace:
//!
//! - [`LogicalCluster`]: the name of an isolated tenant partition of the store
//! - [`ResourceKey`]: the `cluster|namespace|name` identity used as queue key
//! - [`ApiExport`] / [`ApiBinding`]: the parent and child kinds whose marker
//!   label is kept in sync
//! - [`events`]: change notifications published by the store

pub mod cluster;
pub mod error;
pub mod events;
pub mod key;
pub mod resource;

pub use cluster::{LogicalCluster, WILDCARD};
pub use error::{CoreError, Result};
pub use key::{KEY_SEPARATOR, KeyError, ResourceKey};
pub use resource::{
    ApiBinding, ApiBindingSpec, ApiExport, ClusterObject, ExportReference, Labels, ObjectMeta,
    ResourceKind, WorkspaceExportReference,
};
