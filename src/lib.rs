//! # bitevent
//!
//! A typed, in-process publish/subscribe event bus for trees of UI
//! components. Producers declare events by name with a payload-normalizing
//! middleware; any number of components can dispatch an event and any
//! number of components or external subscribers can listen for it, without
//! holding references to each other.
//!
//! ## Architecture
//!
//! bitevent is organized as a workspace:
//!
//! 1. **bitevent-core** - Middleware registry, listener set, dispatch paths,
//!    lifecycle adapter, static façade and the scheduling seam
//! 2. **bitevent** - This facade crate: re-exports and logging setup
//!
//! ## Features
//!
//! - **Declared events**: one middleware per event, run once per dispatch
//! - **Scoped listeners**: registrations released when their binding drops
//! - **Ordered buffering**: rapid dispatches between flushes are all
//!   delivered, in issuance order
//! - **Static façade**: subscribe/dispatch from code outside any scope
//! - **Pluggable priority**: deliveries run through the host's scheduler

pub use bitevent_core::error;
pub use bitevent_core::event_bus;
pub use bitevent_core::types;

pub use bitevent_core::{
    dispatch, events, to_arg, with_default, with_nothing, with_payload, Arity, Binding,
    DispatchRecord, DispatchStatus, DispatchTable, Dispatcher, EventBus, EventBusBuilder,
    EventBusConfig, EventError, EventHook, EventKey, EventProvider, InlineScheduler, ListenerId,
    ListenerRegistry, Middleware, MiddlewareRegistry, Payload, Priority, PriorityScheduler,
    QueuedScheduler, Result, RootScope, StaticEvents, Subscription,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
///
/// Bus diagnostics (listener add/remove, root mount/unmount, unbound
/// dispatch warnings) are emitted under the `bitevent_core` target.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Initialize JSON-formatted logging, for hosts that ship logs to a collector
pub fn init_json_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_target(true))
        .try_init()?;

    Ok(())
}
