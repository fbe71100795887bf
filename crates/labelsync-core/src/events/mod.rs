//! Change notifications.
//!
//! Every successful write to the store is published as a [`ResourceEvent`]
//! carrying the full object. Informers subscribe through the
//! [`EventBroadcaster`] and keep their caches current from this stream.
//!
//! ```text
//!   store write ──▶ EventBroadcaster ──┬──▶ APIExport informer
//!                                      └──▶ APIBinding informer
//! ```

pub mod broadcaster;
pub mod types;

pub use broadcaster::EventBroadcaster;
pub use types::{ResourceEvent, ResourceEventType};
