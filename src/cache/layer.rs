//! Cache layer that puts the TTL cache in front of the request coalescer.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::coalesce::Coalescer;
use super::lock;
use super::storage::TtlCache;

/// Cache-first fetching shared by every component of a session.
///
/// A lookup is answered from the TTL cache when possible. On a miss the
/// fetcher runs through the coalescer, so concurrent misses for one key
/// trigger a single fetch, and a successful result is stored once by that
/// fetch. Failed fetches (`None`) are never cached.
pub struct CacheLayer<K, V> {
  storage: Arc<Mutex<TtlCache<K, V>>>,
  coalescer: Coalescer<K, V>,
}

impl<K, V> CacheLayer<K, V>
where
  K: Eq + Hash + Clone + Debug + Display + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  pub fn new(ttl: Duration) -> Self {
    Self {
      storage: Arc::new(Mutex::new(TtlCache::new(ttl))),
      coalescer: Coalescer::new(),
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Fresh cache entry - return it
  /// 2. Fetch already in flight for the key - wait on it
  /// 3. Otherwise run `fetcher` and cache a successful result
  pub async fn fetch<F, Fut>(&self, key: K, fetcher: F) -> Option<V>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<V>> + Send + 'static,
  {
    if let Some(hit) = self.get(&key) {
      debug!(key = %key, "cache hit");
      return Some(hit);
    }

    debug!(key = %key, "cache miss");
    let storage = Arc::clone(&self.storage);
    let store_key = key.clone();
    self
      .coalescer
      .fetch_once(key, move || {
        let work = fetcher();
        async move {
          let result = work.await;
          if let Some(value) = &result {
            lock(&storage).set(store_key, value.clone());
          }
          result
        }
      })
      .await
  }

  /// Fetch through the coalescer only, for resources too volatile to cache.
  pub async fn fetch_uncached<F, Fut>(&self, key: K, fetcher: F) -> Option<V>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<V>> + Send + 'static,
  {
    self.coalescer.fetch_once(key, fetcher).await
  }

  pub fn get(&self, key: &K) -> Option<V> {
    lock(&self.storage).get(key)
  }

  pub fn set(&self, key: K, value: V) {
    lock(&self.storage).set(key, value);
  }

  /// Drop every cached entry. In-flight fetches are unaffected.
  pub fn clear(&self) {
    lock(&self.storage).clear();
  }

  pub fn len(&self) -> usize {
    lock(&self.storage).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<K, V> Clone for CacheLayer<K, V> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      coalescer: self.coalescer.clone(),
    }
  }
}
