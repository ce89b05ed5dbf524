//! # bitevent Core
//!
//! Event registry, listener set and dispatch engine for bitevent.
//! Provides the building blocks of one bus instance: payload-normalizing
//! middleware, the shared listener set, scoped and static dispatch, and
//! the scheduling seam to the host's render cycle.

pub mod error;
pub mod event_bus;
pub mod types;

pub use error::{EventError, Result};

pub use event_bus::{
    events, to_arg, with_default, with_nothing, with_payload, Arity, Binding, DispatchRecord,
    DispatchStatus, DispatchTable, Dispatcher, EventBus, EventBusBuilder, EventBusConfig,
    EventHook, EventKey, EventProvider, InlineScheduler, ListenerId, ListenerRegistry,
    Middleware, MiddlewareRegistry, Payload, Priority, PriorityScheduler, QueuedScheduler,
    RootScope, StaticEvents, Subscription,
};
