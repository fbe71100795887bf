//! Wires informers, router, queue and worker pool from configuration.

use std::sync::Arc;

use labelsync_config::{LabelSyncConfig, LoggingConfig};
use labelsync_core::events::EventBroadcaster;
use labelsync_core::{ApiBinding, ApiExport};
use labelsync_storage::DynStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::{API_BINDINGS_BY_API_EXPORT, ResourceCache, api_bindings_by_api_export};
use crate::committer::{Committer, MergePatchCommitter};
use crate::controller::{CONTROLLER_NAME, LabelSyncController};
use crate::informer::Informer;
use crate::observability;
use crate::queue::{WorkQueue, default_controller_rate_limiter};
use crate::reconciler::LabelReconciler;
use crate::router::EventRouter;

/// A ready-to-run label sync controller with its informers.
pub struct LabelSyncEngine {
    exports: Arc<Informer<ApiExport>>,
    bindings: Arc<Informer<ApiBinding>>,
    controller: Arc<LabelSyncController>,
    logging: LoggingConfig,
}

impl LabelSyncEngine {
    /// Build an engine that writes through a merge-patch committer on `store`.
    pub fn new(
        config: &LabelSyncConfig,
        store: DynStore,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        let committer = Arc::new(MergePatchCommitter::new(Arc::clone(&store)));
        Self::with_committer(config, store, broadcaster, committer)
    }

    pub fn with_committer(
        config: &LabelSyncConfig,
        store: DynStore,
        broadcaster: Arc<EventBroadcaster>,
        committer: Arc<dyn Committer>,
    ) -> Self {
        let resync = config.controller.resync_period();

        let exports = Arc::new(
            Informer::new(Arc::clone(&store), Arc::clone(&broadcaster), ResourceCache::new())
                .with_resync_period(resync),
        );
        let bindings = Arc::new(
            Informer::new(
                store,
                broadcaster,
                ResourceCache::new()
                    .with_indexer(API_BINDINGS_BY_API_EXPORT, api_bindings_by_api_export),
            )
            .with_resync_period(resync),
        );

        let queue = WorkQueue::new(CONTROLLER_NAME, default_controller_rate_limiter(&config.queue));
        let router = Arc::new(EventRouter::new(queue.clone(), bindings.cache()));
        bindings.add_event_handler(router.clone());
        exports.add_event_handler(router);

        let reconciler = Arc::new(LabelReconciler::new(
            bindings.cache(),
            exports.cache(),
            config.controller.marker_label.clone(),
        ));
        let controller = Arc::new(LabelSyncController::new(
            queue,
            reconciler,
            committer,
            config.controller.workers,
        ));

        Self {
            exports,
            bindings,
            controller,
            logging: config.logging.clone(),
        }
    }

    pub fn controller(&self) -> &Arc<LabelSyncController> {
        &self.controller
    }

    pub fn export_cache(&self) -> Arc<ResourceCache<ApiExport>> {
        self.exports.cache()
    }

    pub fn binding_cache(&self) -> Arc<ResourceCache<ApiBinding>> {
        self.bindings.cache()
    }

    pub fn has_synced(&self) -> bool {
        self.exports.has_synced() && self.bindings.has_synced()
    }

    /// Run informers and workers until `shutdown` flips to `true`.
    ///
    /// Installs the configured tracing subscriber unless one is already set.
    /// Workers only start once both caches have synced.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if !observability::init_tracing(&self.logging) {
            debug!("Global tracing subscriber already set, keeping it");
        }
        let exports = tokio::spawn(Arc::clone(&self.exports).run(shutdown.clone()));
        let bindings = tokio::spawn(Arc::clone(&self.bindings).run(shutdown.clone()));

        let synced = async {
            self.exports.wait_for_sync().await && self.bindings.wait_for_sync().await
        };
        let start_workers = tokio::select! {
            synced = synced => synced,
            _ = shutdown.wait_for(|stop| *stop) => false,
        };

        if start_workers {
            info!(controller = CONTROLLER_NAME, "Caches synced");
            Arc::clone(&self.controller).start(shutdown).await;
        } else {
            self.controller.queue().shut_down();
        }

        join_informer("APIExport", exports).await;
        join_informer("APIBinding", bindings).await;
    }
}

async fn join_informer(kind: &str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        error!(controller = CONTROLLER_NAME, kind, error = %e, "Informer task failed");
    }
}
