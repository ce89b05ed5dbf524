//! Type system utilities and aliases.
//!
//! This module provides type aliases for the shared containers and
//! callback shapes used throughout the event bus.
//!
//! ## Modules
//!
//! - [`aliases`]: Type aliases for `Arc<Mutex<T>>`, listener callbacks, scheduler tasks, etc.

pub mod aliases;

pub use aliases::*;
