//! Informer: keeps a [`ResourceCache`] in step with the store.
//!
//! ## Lifecycle
//!
//! 1. Subscribe to the change stream (before listing, so nothing is missed)
//! 2. List every object of the kind across all clusters and fill the cache
//! 3. Mark the informer synced
//! 4. Apply change events in receipt order, then notify handlers
//!
//! If the subscription lags and events are lost, the informer relists and
//! reports the difference to handlers as synthetic updates and deletes.
//! An optional resync period re-delivers every cached object as an update.

use std::collections::HashMap;
use std::future;
use std::sync::Arc;
use std::time::Duration;

use labelsync_core::events::{EventBroadcaster, ResourceEvent, ResourceEventType};
use labelsync_core::{ClusterObject, LogicalCluster, ResourceKey};
use labelsync_storage::DynStore;
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::time::{Interval, interval_at};
use tracing::{debug, error, info, warn};

use crate::cache::ResourceCache;
use crate::error::ControllerError;

/// Delay between attempts when listing fails.
const LIST_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A cache change, delivered after the cache has been updated.
#[derive(Debug, Clone)]
pub enum Notification<T> {
    Added(T),
    Updated { old: T, new: T },
    /// `last` is `None` when the final state of the object is unknown.
    Deleted { key: ResourceKey, last: Option<T> },
}

impl<T: ClusterObject> Notification<T> {
    /// Key of the object this notification is about.
    pub fn key(&self) -> Result<ResourceKey, labelsync_core::KeyError> {
        match self {
            Notification::Added(obj) => obj.key(),
            Notification::Updated { new, .. } => new.key(),
            Notification::Deleted { key, .. } => Ok(key.clone()),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Notification::Added(_) => "added",
            Notification::Updated { .. } => "updated",
            Notification::Deleted { .. } => "deleted",
        }
    }
}

/// Receives cache notifications from an informer.
pub trait EventHandler<T>: Send + Sync {
    fn handle(&self, notification: &Notification<T>);
}

pub struct Informer<T: ClusterObject> {
    store: DynStore,
    broadcaster: Arc<EventBroadcaster>,
    cache: Arc<ResourceCache<T>>,
    handlers: RwLock<Vec<Arc<dyn EventHandler<T>>>>,
    resync_period: Option<Duration>,
    synced: watch::Sender<bool>,
}

impl<T: ClusterObject> Informer<T> {
    pub fn new(
        store: DynStore,
        broadcaster: Arc<EventBroadcaster>,
        cache: ResourceCache<T>,
    ) -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            store,
            broadcaster,
            cache: Arc::new(cache),
            handlers: RwLock::new(Vec::new()),
            resync_period: None,
            synced,
        }
    }

    /// Re-deliver every cached object as an update at this period.
    pub fn with_resync_period(mut self, period: Option<Duration>) -> Self {
        self.resync_period = period.filter(|p| !p.is_zero());
        self
    }

    /// Shared read handle to the cache.
    pub fn cache(&self) -> Arc<ResourceCache<T>> {
        Arc::clone(&self.cache)
    }

    pub fn add_event_handler(&self, handler: Arc<dyn EventHandler<T>>) {
        self.handlers.write().push(handler);
    }

    /// Whether the initial list has been applied.
    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Wait until the initial list has been applied.
    ///
    /// Returns `false` if the informer was dropped before syncing.
    pub async fn wait_for_sync(&self) -> bool {
        let mut rx = self.synced.subscribe();
        rx.wait_for(|synced| *synced).await.is_ok()
    }

    /// Run until `shutdown` flips to `true`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.broadcaster.subscribe();

        if !self.relist_until_ok(&mut shutdown).await {
            return;
        }
        self.synced.send_replace(true);
        info!(kind = %T::KIND, objects = self.cache.len(), "Informer synced");

        let mut resync = self.resync_period.map(|period| {
            interval_at(tokio::time::Instant::now() + period, period)
        });

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => self.apply(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(kind = %T::KIND, missed, "Informer lagged, relisting");
                        if !self.relist_until_ok(&mut shutdown).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(kind = %T::KIND, "Change stream closed, informer stopping");
                        break;
                    }
                },
                _ = tick(&mut resync) => self.resync(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(kind = %T::KIND, "Informer shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Relist, retrying on store errors. Returns `false` on shutdown.
    async fn relist_until_ok(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            if *shutdown.borrow() {
                return false;
            }
            match self.relist().await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(kind = %T::KIND, error = %e, "List failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(LIST_RETRY_DELAY) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                return false;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Replace the cache with a fresh listing and report the difference.
    async fn relist(&self) -> Result<(), ControllerError> {
        let stored = self
            .store
            .list(T::KIND, &LogicalCluster::wildcard())
            .await?;

        let mut objects = Vec::with_capacity(stored.len());
        for item in stored {
            match item.decode::<T>() {
                Ok(obj) => objects.push(obj),
                Err(e) => error!(kind = %T::KIND, key = %item.key, error = %e, "Skipping undecodable object"),
            }
        }

        let before: HashMap<String, T> = self
            .cache
            .list()
            .into_iter()
            .filter_map(|obj| obj.key().ok().map(|k| (k.encode(), obj)))
            .collect();
        let vanished = self.cache.replace(objects.clone());

        let mut notifications = Vec::with_capacity(objects.len() + vanished.len());
        for new in objects {
            let previous = new.key().ok().and_then(|k| before.get(&k.encode()).cloned());
            notifications.push(match previous {
                Some(old) => Notification::Updated { old, new },
                None => Notification::Added(new),
            });
        }
        for last in vanished {
            if let Ok(key) = last.key() {
                notifications.push(Notification::Deleted {
                    key,
                    last: Some(last),
                });
            }
        }

        debug!(kind = %T::KIND, objects = self.cache.len(), "Relisted");
        for notification in &notifications {
            self.dispatch(notification);
        }
        Ok(())
    }

    fn resync(&self) {
        let objects = self.cache.list();
        debug!(kind = %T::KIND, objects = objects.len(), "Resync");
        for obj in objects {
            self.dispatch(&Notification::Updated {
                old: obj.clone(),
                new: obj,
            });
        }
    }

    /// Apply one change event to the cache and notify handlers.
    fn apply(&self, event: ResourceEvent) {
        if !event.matches_kind(T::KIND) {
            return;
        }
        if event.event_type == ResourceEventType::Deleted {
            // The key alone decides what leaves the cache; the body is a hint.
            let removed = self.cache.remove(&event.key);
            let last =
                removed.or_else(|| event.resource.and_then(|body| T::from_value(body).ok()));
            self.dispatch(&Notification::Deleted {
                key: event.key,
                last,
            });
            return;
        }

        let Some(body) = event.resource else {
            warn!(kind = %T::KIND, key = %event.key, event_type = %event.event_type, "Event without object, ignoring");
            return;
        };
        let new = match T::from_value(body) {
            Ok(new) => new,
            Err(e) => {
                error!(kind = %T::KIND, key = %event.key, error = %e, "Dropping undecodable event");
                return;
            }
        };
        let notification = match self.cache.upsert(new.clone()) {
            Ok(Some(old)) => Notification::Updated { old, new },
            Ok(None) => Notification::Added(new),
            Err(e) => {
                error!(kind = %T::KIND, key = %event.key, error = %e, "Dropping event with invalid key");
                return;
            }
        };
        self.dispatch(&notification);
    }

    fn dispatch(&self, notification: &Notification<T>) {
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler.handle(notification);
        }
    }
}

async fn tick(resync: &mut Option<Interval>) {
    match resync {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
