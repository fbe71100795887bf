//! # labelsync-controller
//!
//! Keeps the marker label of every APIBinding in step with the APIExport it
//! binds to, across logical clusters.
//!
//! ## Data flow
//!
//! ```text
//! store events → Informer → ResourceCache → EventRouter → WorkQueue
//!                                                            ↓
//!                store ← MergePatchCommitter ← LabelReconciler ← worker
//! ```
//!
//! The write made by the committer produces a new change event, which closes
//! the loop without polling.
//!
//! ## Example
//!
//! ```ignore
//! let broadcaster = EventBroadcaster::new_shared();
//! let store = Arc::new(EventedStore::new(InMemoryStore::new(), broadcaster.clone()));
//! let engine = LabelSyncEngine::new(&load_config(None)?, store, broadcaster);
//!
//! let (shutdown, rx) = tokio::sync::watch::channel(false);
//! engine.run(rx).await;
//! ```

pub mod cache;
pub mod committer;
pub mod controller;
pub mod engine;
pub mod error;
pub mod informer;
pub mod observability;
pub mod patch;
pub mod queue;
pub mod reconciler;
pub mod router;

pub use cache::{API_BINDINGS_BY_API_EXPORT, ResourceCache, api_bindings_by_api_export};
pub use committer::{Committer, MergePatchCommitter};
pub use controller::{CONTROLLER_NAME, LabelSyncController};
pub use engine::LabelSyncEngine;
pub use error::ControllerError;
pub use informer::{EventHandler, Informer, Notification};
pub use patch::{LabelOp, LabelPatch};
pub use queue::{RateLimiter, WorkQueue, default_controller_rate_limiter};
pub use reconciler::{LabelReconciler, Reconciliation, compute_label_patch};
pub use router::EventRouter;
