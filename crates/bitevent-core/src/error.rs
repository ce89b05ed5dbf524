//! Error handling for bitevent
//!
//! Provides the error taxonomy of the event-routing engine:
//! - Lookup errors (event names missing from the middleware registry)
//! - Argument errors (dispatch arity, payload serialization)
//! - Lifecycle errors (root scope mounting)
//! - Configuration errors
//!
//! Unbound dispatch is deliberately absent: dispatching without an active
//! root is a recorded no-op, reported through
//! [`DispatchStatus::Discarded`](crate::event_bus::DispatchStatus::Discarded).
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::event_bus::Arity;

/// Event bus error type
///
/// Event names are carried in their `Debug` rendering so the error type
/// stays independent of the bus key type.
#[derive(Error, Debug)]
pub enum EventError {
    /// The event name has no registered middleware
    #[error("Unknown event {event}: no middleware registered")]
    UnknownEvent {
        /// The event name that was not found.
        event: String,
    },

    /// Dispatch argument count does not match the middleware declaration
    #[error("Event {event} expects {expected} argument(s), got {got}")]
    ArityMismatch {
        /// The event name being dispatched.
        event: String,
        /// The arity declared by the middleware.
        expected: Arity,
        /// The number of arguments supplied.
        got: usize,
    },

    /// A dispatch argument could not be converted into a payload value
    #[error("Invalid payload for event {event}: {source}")]
    Payload {
        /// The event name being dispatched.
        event: String,
        /// The underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A root scope is already mounted for this bus
    #[error("A root scope is already mounted on bus '{bus}'")]
    RootAlreadyMounted {
        /// The configured bus name.
        bus: String,
    },

    /// Bus configuration could not be parsed
    #[error("Invalid event bus configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl EventError {
    pub(crate) fn unknown_event(event: &impl std::fmt::Debug) -> Self {
        EventError::UnknownEvent {
            event: format!("{:?}", event),
        }
    }

    /// Check if this is an unknown event error
    pub fn is_unknown_event(&self) -> bool {
        matches!(self, EventError::UnknownEvent { .. })
    }

    /// Check if this is an argument error (arity or payload conversion)
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            EventError::ArityMismatch { .. } | EventError::Payload { .. }
        )
    }
}

/// Result type using EventError
pub type Result<T> = std::result::Result<T, EventError>;
