//! Turns cache notifications into queue keys.
//!
//! - APIBinding changes enqueue the binding itself.
//! - APIExport changes enqueue every binding that references the export,
//!   found through the `apibindings-by-apiexport` index.
//!
//! Deletes are routed like updates; the reconciler treats a missing object
//! as nothing to do.

use std::sync::Arc;

use labelsync_core::{ApiBinding, ApiExport, ClusterObject};
use tracing::{debug, error};

use crate::cache::{API_BINDINGS_BY_API_EXPORT, ResourceCache};
use crate::informer::{EventHandler, Notification};
use crate::queue::WorkQueue;

#[derive(Clone)]
pub struct EventRouter {
    queue: WorkQueue<String>,
    bindings: Arc<ResourceCache<ApiBinding>>,
}

impl EventRouter {
    pub fn new(queue: WorkQueue<String>, bindings: Arc<ResourceCache<ApiBinding>>) -> Self {
        Self { queue, bindings }
    }

    fn enqueue_binding(&self, notification: &Notification<ApiBinding>) {
        let key = match notification.key() {
            Ok(key) => key.encode(),
            Err(e) => {
                error!(error = %e, "Could not derive APIBinding key, dropping event");
                return;
            }
        };
        debug!(key = %key, "Queueing APIBinding");
        self.queue.add(key);
    }

    fn enqueue_bindings_for_export(&self, notification: &Notification<ApiExport>) {
        let export_key = match notification.key() {
            Ok(key) => key.encode(),
            Err(e) => {
                error!(error = %e, "Could not derive APIExport key, dropping event");
                return;
            }
        };
        let bindings = match self.bindings.by_index(API_BINDINGS_BY_API_EXPORT, &export_key) {
            Ok(bindings) => bindings,
            Err(e) => {
                error!(export = %export_key, error = %e, "Index lookup failed");
                return;
            }
        };
        for binding in bindings {
            match binding.key() {
                Ok(key) => {
                    let key = key.encode();
                    debug!(key = %key, "Queueing APIBinding because of APIExport {export_key}");
                    self.queue.add(key);
                }
                Err(e) => error!(error = %e, "Could not derive APIBinding key"),
            }
        }
    }
}

impl EventHandler<ApiBinding> for EventRouter {
    fn handle(&self, notification: &Notification<ApiBinding>) {
        self.enqueue_binding(notification);
    }
}

impl EventHandler<ApiExport> for EventRouter {
    fn handle(&self, notification: &Notification<ApiExport>) {
        self.enqueue_bindings_for_export(notification);
    }
}
