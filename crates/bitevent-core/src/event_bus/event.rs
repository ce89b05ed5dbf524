//! Event type definitions for the event bus.
//!
//! An event is identified by a key of the bus's choosing and carries a
//! JSON payload that has already been normalized by its middleware.
//! Records are ephemeral: they are created per dispatch, delivered, and
//! discarded. Nothing here is persisted or replayed.

use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{EventError, Result};

/// The normalized payload delivered to listeners.
pub type Payload = Value;

/// Identity of one kind of event within one bus.
///
/// Implemented for every `Clone + Eq + Hash + Debug` type, so string keys,
/// integer keys and user enums all work. An enum key makes unknown event
/// names a compile error.
pub trait EventKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> EventKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// One dispatch call, after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord<K> {
    /// The event name that was dispatched.
    pub event: K,
    /// The middleware-normalized payload.
    pub payload: Payload,
}

impl<K: EventKey> DispatchRecord<K> {
    /// Create a new record
    pub fn new(event: K, payload: Payload) -> Self {
        Self { event, payload }
    }
}

/// What a dispatch call did with its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Buffered into the active root; delivered on its next flush.
    Buffered,
    /// Handed to the scheduler at normal priority; not yet delivered.
    Scheduled,
    /// Delivered synchronously to this many listeners.
    Delivered(usize),
    /// Nothing could receive the record, so it was dropped.
    Discarded,
}

impl DispatchStatus {
    /// Check if the record was dropped without delivery
    pub fn is_discarded(&self) -> bool {
        matches!(self, DispatchStatus::Discarded)
    }
}

/// Number of raw arguments a middleware accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// Minimum argument count.
    pub min: usize,
    /// Maximum argument count, `None` when unbounded.
    pub max: Option<usize>,
}

impl Arity {
    /// Any number of arguments
    pub const ANY: Arity = Arity { min: 0, max: None };

    /// Exactly `n` arguments
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    /// Between `min` and `max` arguments, inclusive
    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// Check whether `count` arguments satisfy this arity
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl Default for Arity {
    fn default() -> Self {
        Self::ANY
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

/// Convert a typed value into a raw dispatch argument.
pub fn to_arg<T: Serialize + ?Sized>(value: &T) -> std::result::Result<Value, serde_json::Error> {
    serde_json::to_value(value)
}

/// Convert a typed value into a raw dispatch argument for `event`.
///
/// Used by the [`dispatch!`](crate::dispatch) macro so that a failed
/// conversion names the event it belonged to.
pub fn to_event_arg<K: Debug, T: Serialize + ?Sized>(event: &K, value: &T) -> Result<Value> {
    to_arg(value).map_err(|source| EventError::Payload {
        event: format!("{:?}", event),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::ANY.accepts(0));
        assert!(Arity::ANY.accepts(7));
        assert!(Arity::exactly(2).accepts(2));
        assert!(!Arity::exactly(2).accepts(1));
        assert!(Arity::between(0, 1).accepts(0));
        assert!(!Arity::between(0, 1).accepts(2));
    }

    #[test]
    fn test_arity_display() {
        assert_eq!(Arity::exactly(1).to_string(), "1");
        assert_eq!(Arity::between(0, 1).to_string(), "0 to 1");
        assert_eq!(Arity::ANY.to_string(), "at least 0");
    }

    #[test]
    fn test_to_arg() {
        #[derive(Serialize)]
        struct Press {
            count: u32,
        }

        assert_eq!(to_arg(&Press { count: 1 }).ok(), Some(json!({ "count": 1 })));
        assert_eq!(to_arg("alice").ok(), Some(json!("alice")));
    }

    #[test]
    fn test_to_event_arg_names_event() {
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], 1u8);

        let err = to_event_arg(&"login", &bad).unwrap_err();
        assert!(err.is_argument_error());
        assert!(err.to_string().contains("\"login\""));
    }
}
