//! Middleware registry.
//!
//! Maps every declared event name to the pure function that normalizes raw
//! dispatch arguments into the payload listeners receive. The registry is
//! built once, when the bus is declared, and never changes afterwards.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::event::{Arity, EventKey, Payload};
use crate::error::{EventError, Result};
use crate::types::MiddlewareFn;

/// A payload normalizer plus the argument count it accepts.
#[derive(Clone)]
pub struct Middleware {
    normalize: MiddlewareFn,
    arity: Arity,
}

impl Middleware {
    /// Wrap a normalizing function accepting any number of arguments
    pub fn new<F>(normalize: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            normalize: Arc::new(normalize),
            arity: Arity::ANY,
        }
    }

    /// Restrict the number of raw arguments this middleware accepts
    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    /// The declared arity
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Run the normalizer
    pub fn apply(&self, args: &[Value]) -> Payload {
        (self.normalize)(args)
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Middleware")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Identity payload: the single argument is delivered unchanged.
///
/// Dispatching with no argument delivers `null`.
pub fn with_payload() -> Middleware {
    Middleware::new(|args| args.first().cloned().unwrap_or(Value::Null))
        .with_arity(Arity::between(0, 1))
}

/// No payload: every argument is ignored and `null` is delivered.
pub fn with_nothing() -> Middleware {
    Middleware::new(|_| Value::Null)
}

/// Default-merged payload.
///
/// Each dispatch shallow-merges its optional object argument over `base`.
/// A missing, `null` or non-object argument delivers `base` unchanged,
/// the way object spread ignores non-objects.
pub fn with_default(base: Value) -> Middleware {
    Middleware::new(move |args| {
        let mut merged = match &base {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Some(Value::Object(partial)) = args.first() {
            for (key, value) in partial {
                merged.insert(key.clone(), value.clone());
            }
        }
        Value::Object(merged)
    })
    .with_arity(Arity::between(0, 1))
}

/// Fixed mapping from event name to middleware, one per bus.
#[derive(Clone)]
pub struct MiddlewareRegistry<K: EventKey> {
    entries: HashMap<K, Middleware>,
}

impl<K: EventKey> MiddlewareRegistry<K> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, event: K, middleware: Middleware) -> Self {
        self.insert(event, middleware);
        self
    }

    /// Declare an event; a later declaration of the same name replaces the earlier one
    pub fn insert(&mut self, event: K, middleware: Middleware) {
        if self.entries.insert(event.clone(), middleware).is_some() {
            tracing::warn!("Event {:?} declared twice, keeping the last middleware", event);
        }
    }

    /// Middleware for an event, if declared
    pub fn get(&self, event: &K) -> Option<&Middleware> {
        self.entries.get(event)
    }

    /// Check whether an event is declared
    pub fn contains(&self, event: &K) -> bool {
        self.entries.contains_key(event)
    }

    /// All declared event names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Number of declared events
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no events are declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalize raw arguments for `event`.
    ///
    /// Fails with [`EventError::UnknownEvent`] for undeclared names and
    /// [`EventError::ArityMismatch`] when the argument count is outside the
    /// middleware's arity.
    pub fn normalize(&self, event: &K, args: &[Value]) -> Result<Payload> {
        let middleware = self
            .entries
            .get(event)
            .ok_or_else(|| EventError::unknown_event(event))?;

        let arity = middleware.arity();
        if !arity.accepts(args.len()) {
            return Err(EventError::ArityMismatch {
                event: format!("{:?}", event),
                expected: arity,
                got: args.len(),
            });
        }

        Ok(middleware.apply(args))
    }
}

impl<K: EventKey> Default for MiddlewareRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EventKey> FromIterator<(K, Middleware)> for MiddlewareRegistry<K> {
    fn from_iter<I: IntoIterator<Item = (K, Middleware)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (event, middleware) in iter {
            registry.insert(event, middleware);
        }
        registry
    }
}

impl<K: EventKey> std::fmt::Debug for MiddlewareRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_payload_is_identity() {
        let m = with_payload();
        assert_eq!(m.apply(&[json!({ "count": 1 })]), json!({ "count": 1 }));
        assert_eq!(m.apply(&[]), Value::Null);
    }

    #[test]
    fn test_with_nothing_ignores_arguments() {
        let m = with_nothing();
        assert_eq!(m.apply(&[json!(1), json!("two")]), Value::Null);
        assert!(m.arity().accepts(2));
    }

    #[test]
    fn test_with_default_merges_over_base() {
        let m = with_default(json!({ "id": 0, "name": "anon" }));
        assert_eq!(m.apply(&[]), json!({ "id": 0, "name": "anon" }));
        assert_eq!(m.apply(&[json!({ "id": 7 })]), json!({ "id": 7, "name": "anon" }));
        assert_eq!(m.apply(&[Value::Null]), json!({ "id": 0, "name": "anon" }));
        assert_eq!(m.apply(&[json!(5)]), json!({ "id": 0, "name": "anon" }));
    }

    #[test]
    fn test_with_default_does_not_mutate_base() {
        let m = with_default(json!({ "id": 0 }));
        m.apply(&[json!({ "id": 9, "extra": true })]);
        assert_eq!(m.apply(&[]), json!({ "id": 0 }));
    }

    #[test]
    fn test_normalize_unknown_event() {
        let registry = MiddlewareRegistry::new().with("press", with_payload());
        let err = registry.normalize(&"missing", &[]).unwrap_err();
        assert!(err.is_unknown_event());
    }

    #[test]
    fn test_normalize_rejects_bad_arity() {
        let registry = MiddlewareRegistry::new().with("press", with_payload());
        let err = registry
            .normalize(&"press", &[json!(1), json!(2)])
            .unwrap_err();
        assert!(matches!(err, EventError::ArityMismatch { got: 2, .. }));
    }

    #[test]
    fn test_custom_middleware() {
        let registry = MiddlewareRegistry::new().with(
            "alice",
            Middleware::new(|args| {
                json!(format!(
                    "alice:{},bob:{}",
                    args[0].as_str().unwrap_or_default(),
                    args[1]
                ))
            })
            .with_arity(Arity::exactly(2)),
        );

        let payload = registry
            .normalize(&"alice", &[json!("alice"), json!(100)])
            .unwrap();
        assert_eq!(payload, json!("alice:alice,bob:100"));
    }

    #[test]
    fn test_registry_from_iter() {
        let registry: MiddlewareRegistry<u32> =
            vec![(1, with_payload()), (2, with_nothing())].into_iter().collect();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&1));
        assert!(!registry.contains(&3));
        assert!(!registry.is_empty());
    }
}
