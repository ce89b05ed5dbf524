//! Event Bus implementation.
//!
//! Provides the [`EventBus`] instance that owns one middleware registry and
//! one listener set, the two dispatch paths, and the [`events`] factory
//! that splits a bus into its provider, hook and static façade.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::event::{DispatchRecord, DispatchStatus, EventKey};
use super::listener::{ListenerId, ListenerRegistry, ListenerSet, Origin};
use super::middleware::MiddlewareRegistry;
use super::scheduler::{InlineScheduler, Priority, PriorityScheduler};
use super::scope::{EventHook, EventProvider, RootState};
use super::static_events::StaticEvents;
use crate::error::{EventError, Result};
use crate::types::{thread_safe, thread_safe_rw, ThreadSafe, ThreadSafeRw};

/// Configuration for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Label used in log output.
    pub name: String,
    /// Warn when a dispatch or binding has no root scope to attach to.
    pub warn_unbound: bool,
    /// Channel capacity for async receivers.
    pub channel_capacity: usize,
}

impl EventBusConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            name: "events".to_string(),
            warn_unbound: cfg!(debug_assertions),
            channel_capacity: 1024,
        }
    }
}

struct BusInner<K: EventKey> {
    config: EventBusConfig,
    middlewares: MiddlewareRegistry<K>,
    listeners: ListenerSet<K>,
    root: ThreadSafeRw<Option<Arc<RootState<K>>>>,
    scheduler: Arc<dyn PriorityScheduler>,
    sender: broadcast::Sender<DispatchRecord<K>>,
    discarded: AtomicU64,
}

/// One bus instance: a middleware registry, a listener set, and the root
/// slot that scoped dispatch buffers into.
///
/// Cloning is cheap and every clone refers to the same instance.
pub struct EventBus<K: EventKey> {
    inner: Arc<BusInner<K>>,
}

impl<K: EventKey> Clone for EventBus<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for an [`EventBus`] with custom configuration or scheduler
pub struct EventBusBuilder<K: EventKey> {
    middlewares: MiddlewareRegistry<K>,
    config: EventBusConfig,
    scheduler: Arc<dyn PriorityScheduler>,
}

impl<K: EventKey> EventBusBuilder<K> {
    /// Use a custom configuration
    pub fn config(mut self, config: EventBusConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the host's priority scheduler instead of running deliveries inline
    pub fn scheduler(mut self, scheduler: Arc<dyn PriorityScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Build the bus
    pub fn build(self) -> EventBus<K> {
        let (sender, _) = broadcast::channel(self.config.channel_capacity.max(1));
        tracing::debug!(
            "Event bus '{}' declared with {} event(s)",
            self.config.name,
            self.middlewares.len()
        );
        EventBus {
            inner: Arc::new(BusInner {
                config: self.config,
                middlewares: self.middlewares,
                listeners: ListenerSet::new(),
                root: thread_safe_rw(None),
                scheduler: self.scheduler,
                sender,
                discarded: AtomicU64::new(0),
            }),
        }
    }
}

impl<K: EventKey> EventBus<K> {
    /// Create a new event bus with default configuration
    pub fn new(middlewares: MiddlewareRegistry<K>) -> Self {
        Self::builder(middlewares).build()
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(middlewares: MiddlewareRegistry<K>, config: EventBusConfig) -> Self {
        Self::builder(middlewares).config(config).build()
    }

    /// Start building a bus
    pub fn builder(middlewares: MiddlewareRegistry<K>) -> EventBusBuilder<K> {
        EventBusBuilder {
            middlewares,
            config: EventBusConfig::default(),
            scheduler: Arc::new(InlineScheduler),
        }
    }

    /// Split into the mountable provider, the listener hook and the static façade
    pub fn split(&self) -> (EventProvider<K>, EventHook<K>, StaticEvents<K>) {
        (
            EventProvider::new(self.clone()),
            EventHook::new(self.clone()),
            StaticEvents::new(self.clone()),
        )
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.inner.config
    }

    /// The declared middleware
    pub fn middlewares(&self) -> &MiddlewareRegistry<K> {
        &self.inner.middlewares
    }

    /// Get the number of registrations in the listener set
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Check whether a root scope is mounted
    pub fn has_root(&self) -> bool {
        self.inner.root.read().is_some()
    }

    /// Number of dispatches dropped because nothing could receive them
    pub fn discarded_count(&self) -> u64 {
        self.inner.discarded.load(Ordering::Relaxed)
    }

    /// Get a receiver for every delivered record
    pub fn receiver(&self) -> broadcast::Receiver<DispatchRecord<K>> {
        self.inner.sender.subscribe()
    }

    /// Normalize raw arguments into a record, once per dispatch
    pub(crate) fn normalize(&self, event: K, args: &[Value]) -> Result<DispatchRecord<K>> {
        let payload = self.inner.middlewares.normalize(&event, args)?;
        Ok(DispatchRecord::new(event, payload))
    }

    pub(crate) fn register(&self, listeners: ListenerRegistry<K>, origin: Origin) -> ListenerId {
        for event in listeners.events() {
            if !self.inner.middlewares.contains(event) {
                tracing::warn!(
                    "Listener for undeclared event {:?} on bus '{}' will never be called",
                    event,
                    self.inner.config.name
                );
            }
        }
        self.inner.listeners.push(listeners, origin)
    }

    pub(crate) fn unregister(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    pub(crate) fn is_registered(&self, id: ListenerId) -> bool {
        self.inner.listeners.contains(id)
    }

    pub(crate) fn static_listener_count(&self) -> usize {
        self.inner
            .listeners
            .snapshot()
            .iter()
            .filter(|entry| entry.origin() == Origin::Static)
            .count()
    }

    pub(crate) fn warn_unbound(&self, what: &str) {
        if self.inner.config.warn_unbound {
            tracing::warn!(
                "{} on bus '{}' has no mounted root scope; mount the provider first",
                what,
                self.inner.config.name
            );
        }
    }

    fn discard(&self, record: &DispatchRecord<K>) -> DispatchStatus {
        self.inner.discarded.fetch_add(1, Ordering::Relaxed);
        self.warn_unbound(&format!("Dispatch of {:?}", record.event));
        DispatchStatus::Discarded
    }

    /// Scoped dispatch: buffer into the active root and request a flush.
    pub(crate) fn dispatch_scoped(&self, record: DispatchRecord<K>) -> DispatchStatus {
        let Some(root) = self.inner.root.read().clone() else {
            return self.discard(&record);
        };

        if root.enqueue(record) {
            let bus = self.clone();
            let task_root = Arc::clone(&root);
            self.inner.scheduler.run_with_priority(
                Priority::Normal,
                Box::new(move || {
                    bus.flush(&task_root);
                }),
            );
        }
        DispatchStatus::Buffered
    }

    /// Immediate dispatch: deliver now, through the scheduler when a root is mounted.
    pub(crate) fn dispatch_static(&self, record: DispatchRecord<K>) -> DispatchStatus {
        let root = self.inner.root.read().clone();
        let Some(root) = root else {
            if self.inner.listeners.is_empty() && self.inner.sender.receiver_count() == 0 {
                return self.discard(&record);
            }
            let (delivered, panic_err) = self.deliver(&record, None);
            if let Some(panic_err) = panic_err {
                panic::resume_unwind(panic_err);
            }
            return DispatchStatus::Delivered(delivered);
        };

        let outcome: ThreadSafe<Option<usize>> = thread_safe(None);
        let task_outcome = Arc::clone(&outcome);
        let bus = self.clone();
        self.inner.scheduler.run_with_priority(
            Priority::Normal,
            Box::new(move || {
                // Unmounted before the scheduler got to it
                if !root.is_active() {
                    return;
                }
                let (delivered, panic_err) = bus.deliver(&record, Some(&*root));
                *task_outcome.lock() = Some(delivered);
                if let Some(panic_err) = panic_err {
                    panic::resume_unwind(panic_err);
                }
            }),
        );

        let delivered = *outcome.lock();
        match delivered {
            Some(delivered) => DispatchStatus::Delivered(delivered),
            None => DispatchStatus::Scheduled,
        }
    }

    /// Deliver every record buffered in `root`, in issuance order.
    ///
    /// Records buffered by listeners while the flush runs are delivered in
    /// the same pass. A flush requested while one is running returns 0 and
    /// leaves the work to the running one. The first listener panic is
    /// re-raised once the buffer is drained.
    pub(crate) fn flush(&self, root: &RootState<K>) -> usize {
        if !root.begin_flush() {
            return 0;
        }

        let mut delivered = 0;
        let mut first_panic = None;
        while let Some(batch) = root.take_batch() {
            for record in batch {
                if !root.is_active() {
                    break;
                }
                let (count, panic_err) = self.deliver(&record, Some(root));
                delivered += count;
                if first_panic.is_none() {
                    first_panic = panic_err;
                }
            }
        }

        if let Some(panic_err) = first_panic {
            panic::resume_unwind(panic_err);
        }
        delivered
    }

    fn deliver(
        &self,
        record: &DispatchRecord<K>,
        root: Option<&RootState<K>>,
    ) -> (usize, Option<Box<dyn std::any::Any + Send>>) {
        let delivery = self.inner.listeners.deliver(record);
        if let Some(root) = root {
            root.set_current(record.clone());
        }
        // No async receivers is fine.
        let _ = self.inner.sender.send(record.clone());
        (delivery.delivered, delivery.panic)
    }

    pub(crate) fn mount(&self) -> Result<Arc<RootState<K>>> {
        let mut slot = self.inner.root.write();
        if slot.is_some() {
            return Err(EventError::RootAlreadyMounted {
                bus: self.inner.config.name.clone(),
            });
        }
        let root = Arc::new(RootState::new());
        *slot = Some(Arc::clone(&root));
        tracing::debug!("Root scope mounted on bus '{}'", self.inner.config.name);
        Ok(root)
    }

    pub(crate) fn unmount(&self, root: &Arc<RootState<K>>) {
        let dropped = root.deactivate();
        let mut slot = self.inner.root.write();
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, root)) {
            *slot = None;
        }
        tracing::debug!(
            "Root scope unmounted from bus '{}' ({} undelivered record(s) dropped)",
            self.inner.config.name,
            dropped
        );
    }
}

impl<K: EventKey> std::fmt::Debug for EventBus<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.inner.middlewares.len())
            .field("listeners", &self.listener_count())
            .field("mounted", &self.has_root())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Declare a bus and split it into provider, hook and static façade
///
/// ```rust,ignore
/// let (provider, hook, statics) = events(
///     MiddlewareRegistry::new()
///         .with("press", with_payload())
///         .with("reset", with_nothing()),
/// );
/// let _root = provider.mount()?;
/// let binding = hook.bind(ListenerRegistry::new().on("press", |p| println!("{p}")));
/// binding.dispatch("press", vec![json!({ "count": 1 })])?;
/// ```
pub fn events<K: EventKey>(
    middlewares: MiddlewareRegistry<K>,
) -> (EventProvider<K>, EventHook<K>, StaticEvents<K>) {
    EventBus::new(middlewares).split()
}

/// Convenience macro to dispatch typed arguments
///
/// Each argument is serialized into a raw payload value; the first
/// conversion failure is returned as [`EventError::Payload`].
#[macro_export]
macro_rules! dispatch {
    ($target:expr, $event:expr $(, $arg:expr)* $(,)?) => {{
        let event = $event;
        let args: ::std::vec::Vec<$crate::error::Result<$crate::event_bus::Payload>> =
            ::std::vec![$($crate::event_bus::to_event_arg(&event, &$arg)),*];
        match args.into_iter().collect::<$crate::error::Result<::std::vec::Vec<_>>>() {
            Ok(args) => $target.dispatch(event, args),
            Err(e) => Err(e),
        }
    }};
}
