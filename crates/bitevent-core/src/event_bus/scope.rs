//! Lifecycle adapter.
//!
//! Ties listener membership and dispatch buffering to scope lifetimes:
//! - [`EventProvider::mount`] activates the root scope. The returned
//!   [`RootScope`] owns the dispatch buffer; dropping it unmounts.
//! - [`EventHook::bind`] adds a registration to the listener set. The
//!   returned [`Binding`] removes it again on drop, on every exit path.
//!
//! Scoped dispatch never calls listeners directly. It buffers the
//! normalized record in the root and asks the scheduler for a flush at
//! normal priority. All records buffered between two flushes are
//! delivered on the next one, in issuance order.
//!
//! Dispatching before any root is mounted is a no-op that reports
//! [`DispatchStatus::Discarded`]; such records are never replayed once a
//! root mounts.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::bus::EventBus;
use super::event::{DispatchRecord, DispatchStatus, EventKey};
use super::listener::{ListenerId, ListenerRegistry, Origin};
use crate::error::{EventError, Result};

struct FlushState<K> {
    pending: Vec<DispatchRecord<K>>,
    scheduled: bool,
    flushing: bool,
}

/// State owned by one mounted root
pub(crate) struct RootState<K: EventKey> {
    active: AtomicBool,
    buffer: Mutex<FlushState<K>>,
    current: Mutex<Option<DispatchRecord<K>>>,
}

impl<K: EventKey> RootState<K> {
    pub(crate) fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            buffer: Mutex::new(FlushState {
                pending: Vec::new(),
                scheduled: false,
                flushing: false,
            }),
            current: Mutex::new(None),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Buffer a record. Returns true when the caller must schedule a flush.
    pub(crate) fn enqueue(&self, record: DispatchRecord<K>) -> bool {
        let mut state = self.buffer.lock();
        if !self.is_active() {
            return false;
        }
        state.pending.push(record);
        if state.scheduled || state.flushing {
            return false;
        }
        state.scheduled = true;
        true
    }

    /// Claim the flush. Returns false if one is already running.
    pub(crate) fn begin_flush(&self) -> bool {
        let mut state = self.buffer.lock();
        state.scheduled = false;
        if state.flushing || !self.is_active() {
            return false;
        }
        state.flushing = true;
        true
    }

    /// Take everything buffered so far, releasing the flush once empty.
    pub(crate) fn take_batch(&self) -> Option<Vec<DispatchRecord<K>>> {
        let mut state = self.buffer.lock();
        if state.pending.is_empty() || !self.is_active() {
            state.pending.clear();
            state.flushing = false;
            return None;
        }
        Some(std::mem::take(&mut state.pending))
    }

    /// Mark unmounted and drop undelivered records, returning how many.
    pub(crate) fn deactivate(&self) -> usize {
        self.active.store(false, Ordering::Release);
        let mut state = self.buffer.lock();
        state.scheduled = false;
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }

    pub(crate) fn set_current(&self, record: DispatchRecord<K>) {
        *self.current.lock() = Some(record);
    }

    fn current(&self) -> Option<DispatchRecord<K>> {
        self.current.lock().clone()
    }

    fn pending(&self) -> usize {
        self.buffer.lock().pending.len()
    }
}

/// Mountable root of a bus
pub struct EventProvider<K: EventKey> {
    bus: EventBus<K>,
}

impl<K: EventKey> EventProvider<K> {
    pub(crate) fn new(bus: EventBus<K>) -> Self {
        Self { bus }
    }

    /// Activate the root scope.
    ///
    /// Only one root may be mounted per bus at a time; unmount by dropping
    /// the returned [`RootScope`].
    pub fn mount(&self) -> Result<RootScope<K>> {
        let state = self.bus.mount()?;
        Ok(RootScope {
            bus: self.bus.clone(),
            state,
        })
    }

    /// The bus this provider belongs to
    pub fn bus(&self) -> &EventBus<K> {
        &self.bus
    }
}

impl<K: EventKey> Clone for EventProvider<K> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
        }
    }
}

/// A mounted root scope; unmounts on drop
pub struct RootScope<K: EventKey> {
    bus: EventBus<K>,
    state: Arc<RootState<K>>,
}

impl<K: EventKey> RootScope<K> {
    /// Deliver every buffered record now, in issuance order.
    ///
    /// Hosts call this from their commit phase when they do not route
    /// flushes through the scheduler. Returns the number of callbacks
    /// invoked; 0 if a flush is already running on this root.
    pub fn flush(&self) -> usize {
        self.bus.flush(&self.state)
    }

    /// Number of records waiting for the next flush
    pub fn pending(&self) -> usize {
        self.state.pending()
    }

    /// The most recently delivered record
    pub fn current(&self) -> Option<DispatchRecord<K>> {
        self.state.current()
    }

    /// Check whether this root is still mounted
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Unmount explicitly; same as dropping
    pub fn unmount(self) {}
}

impl<K: EventKey> Drop for RootScope<K> {
    fn drop(&mut self) {
        self.bus.unmount(&self.state);
    }
}

impl<K: EventKey> std::fmt::Debug for RootScope<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootScope")
            .field("active", &self.is_active())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Listener-registration entry point for lifecycle-scoped callers
pub struct EventHook<K: EventKey> {
    bus: EventBus<K>,
}

impl<K: EventKey> EventHook<K> {
    pub(crate) fn new(bus: EventBus<K>) -> Self {
        Self { bus }
    }

    /// Register listeners for the lifetime of the returned binding
    pub fn bind(&self, listeners: ListenerRegistry<K>) -> Binding<K> {
        if !self.bus.has_root() {
            self.bus.warn_unbound("Binding");
        }
        let id = self.bus.register(listeners, Origin::Scoped);
        Binding {
            bus: self.bus.clone(),
            id: Some(id),
        }
    }

    /// A binding that only dispatches and listens to nothing
    pub fn bind_none(&self) -> Binding<K> {
        Binding {
            bus: self.bus.clone(),
            id: None,
        }
    }
}

impl<K: EventKey> Clone for EventHook<K> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
        }
    }
}

/// A scope's membership in the listener set plus its dispatch function.
///
/// The registration is removed when the binding is released or dropped.
pub struct Binding<K: EventKey> {
    bus: EventBus<K>,
    id: Option<ListenerId>,
}

impl<K: EventKey> Binding<K> {
    /// Normalize and buffer a dispatch into the mounted root.
    ///
    /// Returns [`DispatchStatus::Buffered`] when a root is mounted (with
    /// an inline scheduler the record has already been delivered), or
    /// [`DispatchStatus::Discarded`] when none is.
    pub fn dispatch(&self, event: K, args: Vec<Value>) -> Result<DispatchStatus> {
        let record = self.bus.normalize(event, &args)?;
        Ok(self.bus.dispatch_scoped(record))
    }

    /// Dispatch function bound to one declared event
    pub fn dispatcher(&self, event: K) -> Result<Dispatcher<K>> {
        if !self.bus.middlewares().contains(&event) {
            return Err(EventError::unknown_event(&event));
        }
        Ok(Dispatcher {
            bus: self.bus.clone(),
            event,
        })
    }

    /// One dispatch function per declared event
    pub fn dispatchers(&self) -> DispatchTable<K> {
        let table = self
            .bus
            .middlewares()
            .names()
            .map(|event| {
                let dispatcher = Dispatcher {
                    bus: self.bus.clone(),
                    event: event.clone(),
                };
                (event.clone(), dispatcher)
            })
            .collect();
        DispatchTable { table }
    }

    /// Listener-set handle, `None` for dispatch-only bindings
    pub fn id(&self) -> Option<ListenerId> {
        self.id
    }

    /// Check whether the registration is still in the listener set
    pub fn is_registered(&self) -> bool {
        self.id.is_some_and(|id| self.bus.is_registered(id))
    }

    /// Remove the registration now. Returns true if it was still present.
    pub fn release(&mut self) -> bool {
        self.id.take().is_some_and(|id| self.bus.unregister(id))
    }
}

impl<K: EventKey> Drop for Binding<K> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<K: EventKey> std::fmt::Debug for Binding<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding").field("id", &self.id).finish()
    }
}

/// Scoped dispatch function for a single event
pub struct Dispatcher<K: EventKey> {
    bus: EventBus<K>,
    event: K,
}

impl<K: EventKey> Dispatcher<K> {
    /// Dispatch this event with raw arguments
    pub fn call(&self, args: Vec<Value>) -> Result<DispatchStatus> {
        let record = self.bus.normalize(self.event.clone(), &args)?;
        Ok(self.bus.dispatch_scoped(record))
    }

    /// The event this function dispatches
    pub fn event(&self) -> &K {
        &self.event
    }
}

impl<K: EventKey> Clone for Dispatcher<K> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            event: self.event.clone(),
        }
    }
}

impl<K: EventKey> std::fmt::Debug for Dispatcher<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Dispatcher").field(&self.event).finish()
    }
}

/// Per-event dispatch functions generated from the declared names
#[derive(Debug, Clone)]
pub struct DispatchTable<K: EventKey> {
    table: HashMap<K, Dispatcher<K>>,
}

impl<K: EventKey> DispatchTable<K> {
    /// Dispatch function for `event`
    pub fn get(&self, event: &K) -> Option<&Dispatcher<K>> {
        self.table.get(event)
    }

    /// Number of dispatch functions
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::middleware::{with_nothing, with_payload, MiddlewareRegistry};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn bus() -> EventBus<&'static str> {
        EventBus::new(
            MiddlewareRegistry::new()
                .with("press", with_payload())
                .with("reset", with_nothing()),
        )
    }

    #[test]
    fn test_root_state_buffers_until_flush() {
        let state = RootState::new();
        assert!(state.enqueue(DispatchRecord::new("press", json!(1))));
        // Already scheduled; no second request.
        assert!(!state.enqueue(DispatchRecord::new("press", json!(2))));
        assert_eq!(state.pending(), 2);

        assert!(state.begin_flush());
        assert!(!state.begin_flush());
        let batch = state.take_batch().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].payload, json!(1));
        assert!(state.take_batch().is_none());
        assert!(state.begin_flush());
    }

    #[test]
    fn test_deactivated_root_drops_records() {
        let state = RootState::new();
        state.enqueue(DispatchRecord::new("press", json!(1)));
        assert_eq!(state.deactivate(), 1);
        assert!(!state.enqueue(DispatchRecord::new("press", json!(2))));
        assert!(!state.begin_flush());
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn test_binding_drop_releases_membership() {
        let bus = bus();
        let (_, hook, _) = bus.split();
        {
            let binding = hook.bind(ListenerRegistry::new().on("press", |_| {}));
            assert!(binding.is_registered());
            assert_eq!(bus.listener_count(), 1);
        }
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let bus = bus();
        let (_, hook, _) = bus.split();
        let mut binding = hook.bind(ListenerRegistry::new().on("press", |_| {}));
        assert!(binding.release());
        assert!(!binding.release());
        assert!(!binding.is_registered());
    }

    #[test]
    fn test_dispatch_table_covers_declared_events() {
        let bus = bus();
        let (provider, hook, _) = bus.split();
        let _root = provider.mount().unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let _listener = hook.bind(ListenerRegistry::new().on("reset", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let table = hook.bind_none().dispatchers();
        assert_eq!(table.len(), 2);
        table.get(&"reset").unwrap().call(vec![]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(table.get(&"missing").is_none());
    }

    #[test]
    fn test_dispatcher_for_unknown_event() {
        let bus = bus();
        let (_, hook, _) = bus.split();
        let err = hook.bind_none().dispatcher("missing").unwrap_err();
        assert!(err.is_unknown_event());
    }
}
