//! Listener registrations and the listener set.
//!
//! A [`ListenerRegistry`] maps a subset of event names to callbacks. The
//! [`ListenerSet`] holds every registration currently attached to a bus,
//! whether it came from a lifecycle binding or a static subscription.
//!
//! Delivery walks a snapshot of the set, so registrations may be added or
//! removed from inside a callback without corrupting the walk. Removal
//! also deactivates the entry, which makes the snapshot skip it from that
//! point on.
//!
//! Invocation order across listeners is unspecified. The current
//! implementation happens to follow insertion order; callers must not rely
//! on it.

use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::event::{DispatchRecord, EventKey, Payload};
use crate::types::{thread_safe_rw_vec, ListenerFn, ThreadSafeRwVec};

/// Handle identifying one registration in the listener set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Create a new unique listener ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({})", &self.0.to_string()[..8])
    }
}

/// Where a registration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Tied to a [`Binding`](super::Binding) lifetime.
    Scoped,
    /// Created by [`StaticEvents::subscribe`](super::StaticEvents::subscribe).
    Static,
}

/// Mapping from event names to callbacks.
///
/// A registration only ever receives callbacks for the names it declares.
pub struct ListenerRegistry<K: EventKey> {
    callbacks: HashMap<K, ListenerFn>,
}

impl<K: EventKey> ListenerRegistry<K> {
    /// Create an empty registration
    pub fn new() -> Self {
        Self {
            callbacks: HashMap::new(),
        }
    }

    /// Listen for `event` with a callback receiving the normalized payload
    pub fn on<F>(mut self, event: K, callback: F) -> Self
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.callbacks.insert(event, Arc::new(callback));
        self
    }

    /// Listen for `event`, deserializing the payload into `T` first.
    ///
    /// Payloads that do not deserialize are skipped with a warning.
    pub fn on_typed<T, F>(self, event: K, callback: F) -> Self
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let name = event.clone();
        self.on(event, move |payload| {
            match serde_json::from_value::<T>(payload.clone()) {
                Ok(value) => callback(value),
                Err(e) => tracing::warn!(
                    "Skipping listener for {:?}: payload does not match {}: {}",
                    name,
                    std::any::type_name::<T>(),
                    e
                ),
            }
        })
    }

    /// Check whether this registration declares a callback for `event`
    pub fn handles(&self, event: &K) -> bool {
        self.callbacks.contains_key(event)
    }

    /// Callback declared for `event`
    pub fn callback(&self, event: &K) -> Option<&ListenerFn> {
        self.callbacks.get(event)
    }

    /// Declared event names
    pub fn events(&self) -> impl Iterator<Item = &K> {
        self.callbacks.keys()
    }

    /// Number of declared callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Check whether no callbacks are declared
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<K: EventKey> Default for ListenerRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EventKey> std::fmt::Debug for ListenerRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.callbacks.keys()).finish()
    }
}

/// One registration inside the set
pub(crate) struct ListenerEntry<K: EventKey> {
    id: ListenerId,
    origin: Origin,
    listeners: ListenerRegistry<K>,
    active: AtomicBool,
}

impl<K: EventKey> ListenerEntry<K> {
    pub(crate) fn origin(&self) -> Origin {
        self.origin
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Result of delivering one record
pub(crate) struct Delivery {
    /// Callbacks invoked, including ones that panicked.
    pub delivered: usize,
    /// First panic raised by a callback, held until siblings have run.
    pub panic: Option<Box<dyn Any + Send>>,
}

/// Ordered collection of registrations shared by every caller of one bus
pub struct ListenerSet<K: EventKey> {
    entries: ThreadSafeRwVec<Arc<ListenerEntry<K>>>,
}

impl<K: EventKey> ListenerSet<K> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            entries: thread_safe_rw_vec(),
        }
    }

    /// Append a registration
    pub fn push(&self, listeners: ListenerRegistry<K>, origin: Origin) -> ListenerId {
        let id = ListenerId::new();
        let entry = Arc::new(ListenerEntry {
            id,
            origin,
            listeners,
            active: AtomicBool::new(true),
        });
        self.entries.write().push(entry);
        tracing::debug!("{} added ({:?})", id, origin);
        id
    }

    /// Remove exactly one registration by identity.
    ///
    /// Returns true if it was present. Removing an absent entry is a no-op.
    pub fn remove(&self, id: ListenerId) -> bool {
        let removed = {
            let mut entries = self.entries.write();
            entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| entries.remove(index))
        };

        match removed {
            Some(entry) => {
                entry.active.store(false, Ordering::Release);
                tracing::debug!("{} removed ({:?})", id, entry.origin);
                true
            }
            None => false,
        }
    }

    /// Check whether a registration is present
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.read().iter().any(|entry| entry.id == id)
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of the current registrations, taken under the read lock
    pub(crate) fn snapshot(&self) -> Vec<Arc<ListenerEntry<K>>> {
        self.entries.read().clone()
    }

    /// Invoke every active callback declared for the record's event.
    ///
    /// No lock is held while callbacks run. Each callback is isolated: a
    /// panic is logged and held so that sibling listeners still run.
    pub(crate) fn deliver(&self, record: &DispatchRecord<K>) -> Delivery {
        let mut delivery = Delivery {
            delivered: 0,
            panic: None,
        };

        for entry in self.snapshot() {
            if !entry.is_active() {
                continue;
            }
            let Some(callback) = entry.listeners.callback(&record.event) else {
                continue;
            };

            tracing::trace!("Delivering {:?} to {}", record.event, entry.id);
            delivery.delivered += 1;
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(&record.payload)));
            if let Err(panic_err) = result {
                tracing::error!(
                    "Listener {} panicked handling {:?}: {}",
                    entry.id,
                    record.event,
                    panic_message(&*panic_err)
                );
                delivery.panic.get_or_insert(panic_err);
            }
        }

        delivery
    }
}

impl<K: EventKey> Default for ListenerSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EventKey> std::fmt::Debug for ListenerSet<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}

fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
