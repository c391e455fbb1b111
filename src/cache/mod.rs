//! Session-scoped caching for remote reads.
//!
//! This module provides the pieces every fetch path shares:
//! - A TTL cache with lazy, read-triggered eviction
//! - A request coalescer that keeps one in-flight fetch per key
//! - A cache layer composing the two into cache-first fetching

mod coalesce;
mod layer;
mod storage;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use coalesce::Coalescer;
pub use layer::CacheLayer;
pub use storage::{TtlCache, DEFAULT_TTL};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
