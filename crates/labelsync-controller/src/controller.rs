//! Worker pool draining the label sync queue.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::committer::Committer;
use crate::error::ControllerError;
use crate::queue::WorkQueue;
use crate::reconciler::LabelReconciler;

pub const CONTROLLER_NAME: &str = "kcp-workload-apibinding-labelsync";

/// Pause before a panicked worker is started again.
const WORKER_RESTART_DELAY: Duration = Duration::from_secs(1);

/// Marks a queue key done when processing ends, panics included.
///
/// A key whose processing panicked is requeued with backoff, since its
/// change was never applied.
struct DoneGuard<'a> {
    queue: &'a WorkQueue<String>,
    key: &'a String,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.queue.add_rate_limited(self.key.clone());
        }
        self.queue.done(self.key);
    }
}

pub struct LabelSyncController {
    queue: WorkQueue<String>,
    reconciler: Arc<LabelReconciler>,
    committer: Arc<dyn Committer>,
    workers: usize,
}

impl LabelSyncController {
    pub fn new(
        queue: WorkQueue<String>,
        reconciler: Arc<LabelReconciler>,
        committer: Arc<dyn Committer>,
        workers: usize,
    ) -> Self {
        Self {
            queue,
            reconciler,
            committer,
            workers: workers.max(1),
        }
    }

    pub fn queue(&self) -> &WorkQueue<String> {
        &self.queue
    }

    /// Run the worker pool until `shutdown` flips to `true`.
    ///
    /// Shutting down closes the queue; queued keys are still drained and
    /// in-flight keys finish before this returns.
    pub async fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            controller = CONTROLLER_NAME,
            workers = self.workers,
            "Starting controller"
        );

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(Arc::clone(&self).supervise_worker(id));
        }

        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
        info!(controller = CONTROLLER_NAME, "Shutting down controller");
        self.queue.shut_down();

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(controller = CONTROLLER_NAME, error = %e, "Worker task failed");
            }
        }
        info!(controller = CONTROLLER_NAME, "Controller stopped");
    }

    /// Keep one worker alive until the queue shuts down.
    async fn supervise_worker(self: Arc<Self>, id: usize) {
        loop {
            let run = AssertUnwindSafe(self.run_worker()).catch_unwind().await;
            if run.is_ok() || self.queue.shutting_down() {
                break;
            }
            error!(
                controller = CONTROLLER_NAME,
                worker = id,
                "Worker panicked, restarting in {WORKER_RESTART_DELAY:?}"
            );
            tokio::time::sleep(WORKER_RESTART_DELAY).await;
        }
        debug!(controller = CONTROLLER_NAME, worker = id, "Worker exited");
    }

    async fn run_worker(&self) {
        while self.process_next_work_item().await {}
    }

    /// Handle one key. Returns `false` once the queue is shut down and empty.
    pub async fn process_next_work_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };
        let _done = DoneGuard {
            queue: &self.queue,
            key: &key,
        };

        debug!(controller = CONTROLLER_NAME, key = %key, "Processing key");
        match self.process(&key).await {
            Ok(()) => self.queue.forget(&key),
            Err(e) if e.is_not_found() => {
                debug!(controller = CONTROLLER_NAME, key = %key, "Object gone, nothing to do");
                self.queue.forget(&key);
            }
            Err(e) if e.is_terminal() => {
                error!(controller = CONTROLLER_NAME, key = %key, error = %e, "Dropping key");
                self.queue.forget(&key);
            }
            Err(e) => {
                warn!(
                    controller = CONTROLLER_NAME,
                    key = %key,
                    requeues = self.queue.num_requeues(&key),
                    error = %e,
                    "Failed to sync labels, requeueing"
                );
                self.queue.add_rate_limited(key.clone());
            }
        }
        true
    }

    /// Reconcile one key and commit the result.
    pub async fn process(&self, key: &str) -> Result<(), ControllerError> {
        let Some(reconciliation) = self.reconciler.reconcile(key)? else {
            return Ok(());
        };
        self.committer
            .apply(&reconciliation.key, &reconciliation.patch)
            .await
    }
}
