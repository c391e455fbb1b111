//! Request coalescing: at most one in-flight fetch per key.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::lock;

type Pending<V> = Shared<BoxFuture<'static, Option<V>>>;
type PendingTable<K, V> = Arc<Mutex<HashMap<K, Pending<V>>>>;

/// Shares one in-flight fetch among every caller asking for the same key.
///
/// A `None` result is the failure sentinel and is shared like any other value.
/// The pending entry is removed as soon as the fetch completes, whatever the
/// outcome, so only temporally overlapping requests are merged.
pub struct Coalescer<K, V> {
  pending: PendingTable<K, V>,
}

impl<K, V> Coalescer<K, V>
where
  K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      pending: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Run `factory` unless a fetch for `key` is already outstanding, in which
  /// case wait on that fetch instead.
  pub async fn fetch_once<F, Fut>(&self, key: K, factory: F) -> Option<V>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<V>> + Send + 'static,
  {
    let shared = {
      let mut pending = lock(&self.pending);
      match pending.get(&key) {
        Some(existing) => {
          debug!(?key, "joining in-flight request");
          existing.clone()
        }
        None => {
          let work = factory();
          let table = Arc::clone(&self.pending);
          let owned_key = key.clone();
          let shared = async move {
            let result = work.await;
            lock(&table).remove(&owned_key);
            result
          }
          .boxed()
          .shared();
          pending.insert(key, shared.clone());
          shared
        }
      }
    };

    shared.await
  }

  /// Number of keys with a fetch currently outstanding.
  pub fn in_flight(&self) -> usize {
    lock(&self.pending).len()
  }
}

impl<K, V> Default for Coalescer<K, V>
where
  K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> Clone for Coalescer<K, V> {
  fn clone(&self) -> Self {
    Self {
      pending: Arc::clone(&self.pending),
    }
  }
}
