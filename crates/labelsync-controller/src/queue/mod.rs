//! Deduplicating, rate-limited work queue.
//!
//! Items move through three sets:
//!
//! - **dirty**: needs processing (queued, or re-added while processing)
//! - **queue**: FIFO of dirty items not currently processing
//! - **processing**: checked out by a worker via [`WorkQueue::get`]
//!
//! An item is handed to at most one worker at a time. Adding an item that is
//! processing only marks it dirty; [`WorkQueue::done`] puts it back in the
//! FIFO so the change is processed exactly once more.

pub mod rate_limiter;

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

pub use rate_limiter::{
    BucketRateLimiter, ItemExponentialFailureRateLimiter, MaxOfRateLimiter, RateLimiter,
    default_controller_rate_limiter,
};

struct QueueState<T> {
    queue: VecDeque<T>,
    dirty: HashSet<T>,
    processing: HashSet<T>,
    shutting_down: bool,
}

struct Inner<T> {
    name: String,
    state: Mutex<QueueState<T>>,
    notify: Notify,
    rate_limiter: Box<dyn RateLimiter<T>>,
}

/// Work queue shared by the event router and the workers.
///
/// Cloning is cheap; all clones share one queue.
pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> WorkQueue<T>
where
    T: Clone + Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
{
    pub fn new(name: impl Into<String>, rate_limiter: impl RateLimiter<T> + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                notify: Notify::new(),
                rate_limiter: Box::new(rate_limiter),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Mark `item` as needing processing. Ignored after shutdown.
    pub fn add(&self, item: T) {
        {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                trace!(queue = %self.inner.name, ?item, "Queue shutting down, dropping add");
                return;
            }
            if !state.dirty.insert(item.clone()) {
                return;
            }
            if state.processing.contains(&item) {
                return;
            }
            state.queue.push_back(item);
        }
        self.inner.notify.notify_one();
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the queue is shut down and drained. The caller
    /// must call [`WorkQueue::done`] with the returned item.
    pub async fn get(&self) -> Option<T> {
        loop {
            // Registered before the state check so a concurrent add or
            // shutdown between the check and the await is not missed.
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    if !state.queue.is_empty() {
                        self.inner.notify.notify_one();
                    }
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Finish processing `item`. If it was re-added meanwhile it is queued again.
    pub fn done(&self, item: &T) {
        let requeued = {
            let mut state = self.inner.state.lock();
            state.processing.remove(item);
            if state.dirty.contains(item) {
                state.queue.push_back(item.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            self.inner.notify.notify_one();
        }
    }

    /// Add `item` once `delay` has elapsed.
    pub fn add_after(&self, item: T, delay: Duration) {
        if self.shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(item);
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(item);
        });
    }

    /// Add `item` after the delay chosen by the rate limiter.
    pub fn add_rate_limited(&self, item: T) {
        let delay = self.inner.rate_limiter.when(&item);
        debug!(queue = %self.inner.name, ?item, delay_ms = delay.as_millis() as u64, "Requeue with backoff");
        self.add_after(item, delay);
    }

    /// Reset the backoff of `item`.
    pub fn forget(&self, item: &T) {
        self.inner.rate_limiter.forget(item);
    }

    pub fn num_requeues(&self, item: &T) -> u32 {
        self.inner.rate_limiter.num_requeues(item)
    }

    /// Number of items waiting to be handed out.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting items and wake every waiting worker.
    ///
    /// Items already queued are still handed out by `get`.
    pub fn shut_down(&self) {
        self.inner.state.lock().shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    pub fn shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("WorkQueue")
            .field("name", &self.inner.name)
            .field("queued", &state.queue.len())
            .field("processing", &state.processing.len())
            .field("shutting_down", &state.shutting_down)
            .finish()
    }
}
