//! Static façade.
//!
//! Subscribe and dispatch without any lifecycle scope: from plain code,
//! tests, or background tasks. Static subscribers live in the same listener
//! set as scoped bindings, so the two are peers. A static dispatch reaches
//! both.

use serde_json::Value;
use tokio::sync::broadcast;

use super::bus::EventBus;
use super::event::{DispatchRecord, DispatchStatus, EventKey};
use super::listener::{ListenerId, ListenerRegistry, Origin};
use crate::error::Result;

/// Scope-free subscribe/dispatch surface of a bus
pub struct StaticEvents<K: EventKey> {
    bus: EventBus<K>,
}

impl<K: EventKey> StaticEvents<K> {
    pub(crate) fn new(bus: EventBus<K>) -> Self {
        Self { bus }
    }

    /// Add a registration until [`Subscription::unsubscribe`] is called.
    ///
    /// Dropping the returned handle does not unsubscribe.
    pub fn subscribe(&self, listeners: ListenerRegistry<K>) -> Subscription<K> {
        let id = self.bus.register(listeners, Origin::Static);
        Subscription {
            bus: self.bus.clone(),
            id,
        }
    }

    /// Normalize and deliver a dispatch immediately.
    ///
    /// With a mounted root, delivery is handed to the scheduler at normal
    /// priority and the result is [`DispatchStatus::Delivered`] if it ran
    /// inline or [`DispatchStatus::Scheduled`] if it was deferred. Without
    /// a root, current listeners are called synchronously. With no root,
    /// no listener and no async receiver the dispatch is discarded.
    /// A delivery still waiting in the scheduler when its root unmounts
    /// is dropped.
    ///
    /// A panicking listener does not stop delivery to its siblings; the
    /// first panic is re-raised afterwards.
    pub fn dispatch(&self, event: K, args: Vec<Value>) -> Result<DispatchStatus> {
        let record = self.bus.normalize(event, &args)?;
        Ok(self.bus.dispatch_static(record))
    }

    /// Get a receiver for every delivered record
    ///
    /// This is useful for async contexts where you want to receive events
    /// in a tokio task.
    pub fn receiver(&self) -> broadcast::Receiver<DispatchRecord<K>> {
        self.bus.receiver()
    }

    /// Number of static subscriptions currently registered
    pub fn listener_count(&self) -> usize {
        self.bus.static_listener_count()
    }

    /// The bus this façade belongs to
    pub fn bus(&self) -> &EventBus<K> {
        &self.bus
    }
}

impl<K: EventKey> Clone for StaticEvents<K> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
        }
    }
}

/// Handle returned by [`StaticEvents::subscribe`]
pub struct Subscription<K: EventKey> {
    bus: EventBus<K>,
    id: ListenerId,
}

impl<K: EventKey> Subscription<K> {
    /// Remove the registration; later calls are no-ops
    pub fn unsubscribe(&self) {
        if !self.bus.unregister(self.id) {
            tracing::trace!("{} already unsubscribed", self.id);
        }
    }

    /// Listener-set handle
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Check whether the registration is still in the listener set
    pub fn is_active(&self) -> bool {
        self.bus.is_registered(self.id)
    }
}

impl<K: EventKey> std::fmt::Debug for Subscription<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
