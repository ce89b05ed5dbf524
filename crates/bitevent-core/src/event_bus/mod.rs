//! # Event Bus Module
//!
//! Typed publish/subscribe for a tree of components that should not hold
//! references to each other.
//!
//! ## Overview
//!
//! Data flows one way:
//! - declaration builds the [`MiddlewareRegistry`]
//! - a dispatch runs its raw arguments through the event's middleware once
//! - the normalized record is delivered to every registration in the
//!   [`ListenerSet`] that declares a callback for that event
//!
//! Two dispatch paths share the same listener set:
//! - **Scoped** ([`Binding::dispatch`]): buffered in the mounted
//!   [`RootScope`] and delivered on its next flush, in issuance order
//! - **Static** ([`StaticEvents::dispatch`]): delivered immediately, via
//!   the [`PriorityScheduler`] at [`Priority::Normal`] when a root is mounted
//!
//! Listener invocation order is unspecified.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bitevent_core::event_bus::*;
//! use serde_json::json;
//!
//! let (provider, hook, statics) = events(
//!     MiddlewareRegistry::new()
//!         .with("press", with_payload())
//!         .with("reset", with_nothing()),
//! );
//!
//! // Mount the root, then bind listeners for the scope's lifetime
//! let root = provider.mount()?;
//! let binding = hook.bind(ListenerRegistry::new().on("press", |payload| {
//!     println!("pressed: {}", payload);
//! }));
//!
//! binding.dispatch("press", vec![json!({ "count": 1 })])?;
//!
//! // Static subscribers are peers of scoped listeners
//! let subscription = statics.subscribe(ListenerRegistry::new().on("reset", |_| {}));
//! statics.dispatch("reset", vec![])?;
//! subscription.unsubscribe();
//! ```

mod bus;
mod event;
mod listener;
mod middleware;
mod scheduler;
mod scope;
mod static_events;

pub use bus::*;
pub use event::*;
pub use listener::{ListenerId, ListenerRegistry, ListenerSet, Origin};
pub use middleware::*;
pub use scheduler::*;
pub use scope::{Binding, DispatchTable, Dispatcher, EventHook, EventProvider, RootScope};
pub use static_events::*;
