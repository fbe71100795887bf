//! Change stream of the store.
//!
//! Writers publish a [`ResourceEvent`] after every successful write and
//! informers subscribe to mirror the stream into their caches. The channel is
//! a bounded tokio broadcast: a receiver that falls more than `capacity`
//! events behind gets `RecvError::Lagged` and has to relist.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::types::ResourceEvent;

/// Events buffered per receiver before it starts lagging.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out handle for change events. Clones share one channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<ResourceEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Publish `event`, returning how many receivers got it.
    pub fn send(&self, event: ResourceEvent) -> usize {
        // Err only means nobody is listening.
        self.sender.send(event).unwrap_or(0)
    }

    /// Open a receiver. Only events published afterwards are delivered, so
    /// subscribe before listing.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.sender.subscribe()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}
