//! In-memory key/value storage with time-based expiry.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_millis(30_000);

/// A single cached value and the moment it was stored.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
  value: V,
  stored_at: Instant,
}

/// Key/value store whose entries expire after a fixed TTL.
///
/// Eviction is lazy: an expired entry is only removed when a `get` touches it.
/// There is no size bound and no background sweep.
#[derive(Debug)]
pub struct TtlCache<K, V> {
  entries: HashMap<K, CacheEntry<V>>,
  ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
  pub fn new(ttl: Duration) -> Self {
    Self {
      entries: HashMap::new(),
      ttl,
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// Look up a value, evicting it if it has outlived the TTL.
  pub fn get(&mut self, key: &K) -> Option<V> {
    let expired = match self.entries.get(key) {
      Some(entry) => entry.stored_at.elapsed() > self.ttl,
      None => return None,
    };

    if expired {
      self.entries.remove(key);
      return None;
    }

    self.entries.get(key).map(|entry| entry.value.clone())
  }

  /// Store a value, replacing whatever was cached under the key.
  pub fn set(&mut self, key: K, value: V) {
    self.entries.insert(
      key,
      CacheEntry {
        value,
        stored_at: Instant::now(),
      },
    );
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// Number of stored entries, expired ones included until they are read.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
  fn default() -> Self {
    Self::new(DEFAULT_TTL)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_get_returns_fresh_value() {
    let mut cache = TtlCache::new(Duration::from_millis(100));
    cache.set("a", 1);
    assert_eq!(cache.get(&"a"), Some(1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_entry_is_evicted_on_read() {
    let mut cache = TtlCache::new(Duration::from_millis(100));
    cache.set("a", 1);

    tokio::time::advance(Duration::from_millis(100)).await;
    // Age equal to the TTL is still fresh
    assert_eq!(cache.get(&"a"), Some(1));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(cache.get(&"a"), None);
    assert!(cache.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_expiry_is_lazy() {
    let mut cache = TtlCache::new(Duration::from_millis(10));
    cache.set("a", 1);
    cache.set("b", 2);

    tokio::time::advance(Duration::from_millis(50)).await;
    assert_eq!(cache.len(), 2);

    assert_eq!(cache.get(&"a"), None);
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_set_resets_age() {
    let mut cache = TtlCache::new(Duration::from_millis(100));
    cache.set("a", 1);
    tokio::time::advance(Duration::from_millis(80)).await;
    cache.set("a", 2);
    tokio::time::advance(Duration::from_millis(80)).await;
    assert_eq!(cache.get(&"a"), Some(2));
  }

  #[test]
  fn test_clear() {
    let mut cache: TtlCache<&str, i32> = TtlCache::default();
    cache.set("a", 1);
    cache.set("b", 2);
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.ttl(), DEFAULT_TTL);
  }
}
