//! Cached item API client that wraps HnClient with caching and coalescing.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::CacheLayer;

use super::cache::{Resource, ResourceKey};
use super::client::HnClient;
use super::transport::FetchError;
use super::types::{FeedType, Item, ItemId, ItemKind, Updates};

/// Item API client with transparent caching support.
///
/// This wraps the underlying HnClient and exposes the same reads, but every
/// read goes through one shared cache layer and never fails: transport and
/// decode errors are logged and surface as an empty list or `None`.
#[derive(Clone)]
pub struct CachedHnClient {
  inner: HnClient,
  cache: CacheLayer<ResourceKey, Resource>,
}

impl CachedHnClient {
  pub fn new(inner: HnClient, ttl: Duration) -> Self {
    Self {
      inner,
      cache: CacheLayer::new(ttl),
    }
  }

  /// Get the ordered id list of a feed, empty on failure.
  pub async fn fetch_id_list(&self, feed: FeedType) -> Arc<[ItemId]> {
    let key = ResourceKey::IdList(feed);
    let inner = self.inner.clone();

    self
      .cache
      .fetch(key, move || async move {
        let ids = inner.fetch_id_list(feed).await;
        settle(key, ids.map(|ids| Some(Resource::IdList(ids.into()))))
      })
      .await
      .and_then(Resource::into_id_list)
      .unwrap_or_else(|| Arc::from(Vec::new()))
  }

  /// Get a single item, `None` if it is unknown or the fetch failed.
  pub async fn fetch_item(&self, id: ItemId) -> Option<Arc<Item>> {
    let key = ResourceKey::Item(id);
    let inner = self.inner.clone();

    self
      .cache
      .fetch(key, move || async move {
        let item = inner.fetch_item(id).await;
        settle(key, item.map(|item| item.map(|i| Resource::Item(Arc::new(i)))))
      })
      .await
      .and_then(Resource::into_item)
  }

  /// Fetch several items concurrently; results line up with `ids`.
  pub async fn fetch_items(&self, ids: &[ItemId]) -> Vec<Option<Arc<Item>>> {
    join_all(ids.iter().map(|&id| self.fetch_item(id))).await
  }

  /// Get recently changed items. Coalesced but never cached.
  pub async fn fetch_updates(&self) -> Option<Arc<Updates>> {
    let key = ResourceKey::Updates;
    let inner = self.inner.clone();

    self
      .cache
      .fetch_uncached(key, move || async move {
        let updates = inner.fetch_updates().await;
        settle(key, updates.map(|u| Some(Resource::Updates(Arc::new(u)))))
      })
      .await
      .and_then(Resource::into_updates)
  }

  /// Resolve the options of a poll, in `parts` order.
  ///
  /// Options that fail to resolve or carry no text are skipped.
  pub async fn fetch_poll_options(&self, poll: &Item) -> Vec<Arc<Item>> {
    if poll.kind != ItemKind::Poll {
      return Vec::new();
    }

    self
      .fetch_items(&poll.parts)
      .await
      .into_iter()
      .flatten()
      .filter(|opt| opt.text.is_some())
      .collect()
  }

  /// Drop every cached id list and item.
  pub fn clear_cache(&self) {
    self.cache.clear();
  }

  pub fn cached_entries(&self) -> usize {
    self.cache.len()
  }
}

/// Collapse a fetch error into absence, logging it on the way.
fn settle(key: ResourceKey, result: Result<Option<Resource>, FetchError>) -> Option<Resource> {
  match result {
    Ok(resource) => resource,
    Err(error) => {
      warn!(key = %key, %error, "fetch failed");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hn::transport::testing::MockTransport;
  use serde_json::json;

  fn client(mock: &MockTransport) -> CachedHnClient {
    let inner = HnClient::new(MockTransport::base_url(), Arc::new(mock.clone())).expect("client");
    CachedHnClient::new(inner, Duration::from_secs(30))
  }

  #[tokio::test]
  async fn test_failures_become_absence() {
    let mock = MockTransport::new();
    mock.fail("/v0/topstories.json", FetchError::Status(503));
    mock.fail("/v0/item/1.json", FetchError::Transport("reset".into()));
    let hn = client(&mock);

    assert!(hn.fetch_id_list(FeedType::TopStories).await.is_empty());
    assert!(hn.fetch_item(1).await.is_none());
    assert_eq!(hn.cached_entries(), 0);
  }

  #[tokio::test]
  async fn test_concurrent_item_reads_hit_network_once() {
    let mock = MockTransport::new();
    mock
      .item(json!({"id": 1, "type": "story"}))
      .delay("/v0/item/1.json", Duration::from_millis(20));
    let hn = client(&mock);

    let results = join_all((0..4).map(|_| hn.fetch_item(1))).await;
    assert!(results.iter().all(|r| r.as_ref().map(|i| i.id) == Some(1)));
    assert_eq!(mock.calls("/v0/item/1.json"), 1);

    // Now cached
    hn.fetch_item(1).await;
    assert_eq!(mock.calls("/v0/item/1.json"), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_id_list_refetched_after_ttl() {
    let mock = MockTransport::new();
    mock.reply("/v0/newstories.json", json!([1, 2]));
    let hn = client(&mock);

    hn.fetch_id_list(FeedType::NewStories).await;
    hn.fetch_id_list(FeedType::NewStories).await;
    assert_eq!(mock.calls("/v0/newstories.json"), 1);

    mock.reply("/v0/newstories.json", json!([3, 1, 2]));
    tokio::time::advance(Duration::from_secs(31)).await;
    let ids = hn.fetch_id_list(FeedType::NewStories).await;
    assert_eq!(&ids[..], &[3, 1, 2]);
    assert_eq!(mock.calls("/v0/newstories.json"), 2);
  }

  #[tokio::test]
  async fn test_fetch_items_preserves_order() {
    let mock = MockTransport::new();
    mock
      .item(json!({"id": 1}))
      .item(json!({"id": 2}))
      .delay("/v0/item/1.json", Duration::from_millis(20));
    let hn = client(&mock);

    let items = hn.fetch_items(&[1, 2, 3]).await;
    let ids: Vec<_> = items.iter().map(|i| i.as_ref().map(|i| i.id)).collect();
    assert_eq!(ids, vec![Some(1), Some(2), None]);
  }

  #[tokio::test]
  async fn test_poll_options() {
    let mock = MockTransport::new();
    mock
      .item(json!({"id": 10, "type": "poll", "parts": [11, 12, 13]}))
      .item(json!({"id": 11, "type": "pollopt", "text": "Yes", "score": 4}))
      .item(json!({"id": 13, "type": "pollopt", "text": "No"}));
    let hn = client(&mock);

    let poll = hn.fetch_item(10).await.expect("poll");
    let options = hn.fetch_poll_options(&poll).await;
    let texts: Vec<_> = options.iter().filter_map(|o| o.text.as_deref()).collect();
    assert_eq!(texts, vec!["Yes", "No"]);
  }

  #[tokio::test]
  async fn test_clear_cache() {
    let mock = MockTransport::new();
    mock.item(json!({"id": 1}));
    let hn = client(&mock);

    hn.fetch_item(1).await;
    hn.clear_cache();
    hn.fetch_item(1).await;
    assert_eq!(mock.calls("/v0/item/1.json"), 2);
  }

  #[tokio::test]
  async fn test_updates_are_not_cached() {
    let mock = MockTransport::new();
    mock.reply("/v0/updates.json", json!({"items": [1], "profiles": []}));
    let hn = client(&mock);

    assert_eq!(hn.fetch_updates().await.map(|u| u.items.clone()), Some(vec![1]));
    hn.fetch_updates().await;
    assert_eq!(mock.calls("/v0/updates.json"), 2);
  }
}
