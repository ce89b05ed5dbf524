//! Type aliases for commonly used complex types.
//!
//! Complex types like `Arc<dyn Fn(&Value) + Send + Sync>` are hard to read
//! at a glance. The aliases below name the handful of shapes the bus
//! passes around:
//! - **Containers**: one bus instance is shared by every producer and
//!   consumer, so its state lives behind `Arc` + `parking_lot` locks
//! - **Callbacks**: middleware and listener functions
//! - **Tasks**: deferred units of work handed to a scheduler
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bitevent_core::types::*;
//!
//! // Instead of: Arc<RwLock<Vec<String>>>
//! let names: ThreadSafeRwVec<String> = thread_safe_rw_vec();
//! ```

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// THREAD-SAFE SHARED TYPES (Arc<Mutex<T>> / Arc<RwLock<T>>)
// =============================================================================

/// A thread-safe, mutex-protected wrapper for cross-thread sharing.
///
/// Uses `parking_lot::Mutex` for better performance than `std::sync::Mutex`.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// A thread-safe reader-writer lock wrapper for read-heavy workloads.
///
/// Dispatch reads far more often than listeners come and go.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

/// A thread-safe reader-writer vector.
pub type ThreadSafeRwVec<T> = Arc<RwLock<Vec<T>>>;

// =============================================================================
// CALLBACK TYPES
// =============================================================================

/// A normalizing function from raw dispatch arguments to one payload value.
pub type MiddlewareFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A listener callback receiving a normalized payload.
///
/// Reference-counted so a snapshot of the listener set can outlive the lock.
pub type ListenerFn = Arc<dyn Fn(&Value) + Send + Sync>;

/// A deferred unit of work handed to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a new thread-safe wrapper.
#[inline]
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

/// Create a new thread-safe reader-writer wrapper.
#[inline]
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}

/// Create a new empty thread-safe reader-writer vector.
#[inline]
pub fn thread_safe_rw_vec<T>() -> ThreadSafeRwVec<T> {
    Arc::new(RwLock::new(Vec::new()))
}
