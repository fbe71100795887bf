//! # labelsync-storage
//!
//! Store abstraction for the labelsync controller.
//!
//! The main trait is [`ClusterStore`], a cluster-partitioned object store with
//! list, get, create, update, merge-patch and delete. Two implementations ship
//! with this crate:
//!
//! - [`InMemoryStore`]: a `DashMap` backed store used for tests and embedding
//! - [`EventedStore`]: a wrapper that publishes watch events after every write
//!
//! ## Example
//!
//! ```ignore
//! use labelsync_storage::{ClusterStore, InMemoryStore, EventedStore};
//!
//! let broadcaster = EventBroadcaster::new_shared();
//! let store = EventedStore::new(InMemoryStore::new(), broadcaster.clone());
//! let bindings = store
//!     .list(ResourceKind::ApiBinding, &LogicalCluster::wildcard())
//!     .await?;
//! ```

use std::sync::Arc;

mod error;
pub mod evented;
pub mod memory;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use evented::EventedStore;
pub use memory::InMemoryStore;
pub use traits::ClusterStore;
pub use types::{PatchType, StoredObject};

/// Result alias for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Shared handle to a store backend.
pub type DynStore = Arc<dyn ClusterStore>;
