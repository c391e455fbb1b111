use std::sync::Arc;
use tracing::{debug, info};

use crate::comments::{CommentThread, CommentTreeBuilder, ExpandOutcome};
use crate::config::Config;
use crate::event::{Event, EventSink, LiveStatus};
use crate::feed::FeedController;
use crate::hn::{CachedHnClient, FeedType, FetchError, HnClient, Item, ItemId, ItemKind, Transport};
use crate::live::{LiveCheck, LivePoller};

/// One browsing session: the shared cached client and every component that
/// reads through it.
///
/// Built explicitly from a [`Config`], a transport and an event sink. All
/// results reach the presentation through the sink; the return values are a
/// convenience for callers that drive the session directly.
#[derive(Clone)]
pub struct Session {
  config: Config,
  client: CachedHnClient,
  feed: FeedController,
  comments: CommentTreeBuilder,
  /// Thread of the currently opened item
  thread: Arc<tokio::sync::Mutex<Option<CommentThread>>>,
  poller: LivePoller,
  events: EventSink,
}

impl Session {
  pub fn new(
    config: Config,
    transport: Arc<dyn Transport>,
    events: EventSink,
  ) -> Result<Self, FetchError> {
    let inner = HnClient::new(&config.api.base_url, transport)?;
    let client = CachedHnClient::new(inner, config.cache_ttl());
    let feed = FeedController::new(client.clone(), config.feed.batch_size, events.clone());
    let comments = CommentTreeBuilder::new(client.clone(), config.tree_limits());
    let poller = LivePoller::new(
      client.clone(),
      feed.clone(),
      config.live_settings(),
      events.clone(),
    );

    Ok(Self {
      config,
      client,
      feed,
      comments,
      thread: Arc::new(tokio::sync::Mutex::new(None)),
      poller,
      events,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn feed(&self) -> &FeedController {
    &self.feed
  }

  pub fn poller(&self) -> &LivePoller {
    &self.poller
  }

  /// Select the configured default feed and start live updates if enabled.
  pub async fn start(&self) -> Vec<Arc<Item>> {
    let items = self.select_feed(self.config.feed.default).await;
    self.set_live_enabled(self.config.live.enabled);
    items
  }

  /// Switch to `feed` and load its first batch.
  pub async fn select_feed(&self, feed: FeedType) -> Vec<Arc<Item>> {
    let items = self.feed.select_feed(feed).await;
    self.poller.rebase();
    items
  }

  pub async fn load_more(&self) -> Vec<Arc<Item>> {
    self.feed.load_next_batch().await
  }

  pub fn has_more(&self) -> bool {
    self.feed.has_more()
  }

  /// Open one item: its details, poll options, parent and comment thread.
  ///
  /// Missing, deleted and dead items produce `ItemUnavailable` instead.
  pub async fn open_item(&self, id: ItemId) -> Option<Arc<Item>> {
    let item = self.resolve(id).await?;

    let parent = async {
      match (item.kind, item.parent) {
        (ItemKind::Comment, Some(parent)) => self.client.fetch_item(parent).await,
        _ => None,
      }
    };
    let (poll_options, parent) =
      futures::join!(self.client.fetch_poll_options(&item), parent);

    self.events.emit(Event::ItemDetails {
      item: Arc::clone(&item),
      poll_options,
      parent,
    });

    self.load_thread(&item).await;
    Some(item)
  }

  /// Build (or rebuild) the comment thread of `id` without the item details.
  pub async fn open_comments(&self, id: ItemId) -> Option<usize> {
    let item = self.resolve(id).await?;
    Some(self.load_thread(&item).await)
  }

  /// Resolve the replies under a comment of the open thread.
  pub async fn expand(&self, node_id: ItemId) -> ExpandOutcome {
    let mut guard = self.thread.lock().await;
    let Some(thread) = guard.as_mut() else {
      return ExpandOutcome::NotFound;
    };

    let outcome = self.comments.expand(thread, node_id).await;
    if let ExpandOutcome::Expanded(_) = outcome {
      self.events.emit(Event::CommentsReady {
        parent_id: thread.parent_id(),
        tree: thread.roots().to_vec(),
      });
    }
    outcome
  }

  /// Snapshot of the open thread.
  pub async fn thread(&self) -> Option<CommentThread> {
    self.thread.lock().await.clone()
  }

  /// Drop every cached entry and reload the active feed from the top.
  pub async fn refresh(&self) -> Vec<Arc<Item>> {
    info!("refreshing");
    self.client.clear_cache();
    let items = self.select_feed(self.feed.feed()).await;
    if self.poller.is_active() {
      self.events.emit(Event::LiveStatus(LiveStatus::UpToDate));
    }
    items
  }

  pub fn set_live_enabled(&self, enabled: bool) {
    self.poller.set_enabled(enabled);
  }

  pub fn set_visible(&self, visible: bool) {
    self.poller.set_visible(visible);
  }

  pub async fn check_now(&self) -> Option<LiveCheck> {
    self.poller.check_now().await
  }

  /// Stop live updates; a check in flight completes first.
  pub async fn shutdown(&self) {
    self.poller.shutdown().await;
    debug!("session closed");
  }

  async fn resolve(&self, id: ItemId) -> Option<Arc<Item>> {
    match self.client.fetch_item(id).await {
      Some(item) if item.is_visible() => Some(item),
      _ => {
        info!(id, "item unavailable");
        self.events.emit(Event::ItemUnavailable { id });
        None
      }
    }
  }

  async fn load_thread(&self, item: &Item) -> usize {
    let thread = self.comments.open_thread(item).await;
    let count = thread.len();
    self.events.emit(Event::CommentsReady {
      parent_id: item.id,
      tree: thread.roots().to_vec(),
    });
    *self.thread.lock().await = Some(thread);
    count
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::{self, EventHandler};
  use crate::hn::transport::testing::MockTransport;
  use serde_json::json;

  fn session(mock: &MockTransport, live: bool) -> (Session, EventHandler) {
    let mut config = Config::default();
    config.api.base_url = MockTransport::base_url().to_string();
    config.live.enabled = live;
    let (sink, events) = event::channel();
    let session = Session::new(config, Arc::new(mock.clone()), sink).expect("session");
    (session, events)
  }

  fn tree_ids(events: &[Event]) -> Option<Vec<ItemId>> {
    events.iter().rev().find_map(|e| match e {
      Event::CommentsReady { tree, .. } => Some(tree.iter().map(|n| n.id()).collect()),
      _ => None,
    })
  }

  #[tokio::test]
  async fn test_start_loads_default_feed() {
    let mock = MockTransport::new();
    mock
      .reply("/v0/newstories.json", json!([1, 2]))
      .item(json!({"id": 1, "type": "story"}))
      .item(json!({"id": 2, "type": "story"}));
    let (session, mut events) = session(&mock, false);

    let items = session.start().await;
    assert_eq!(items.len(), 2);
    assert!(!session.has_more());
    assert_eq!(session.poller().last_known_top(), vec![1, 2]);

    let events = events.drain();
    assert!(matches!(events[0], Event::BatchLoaded { feed: FeedType::NewStories, .. }));
    assert!(matches!(events[1], Event::FeedExhausted { .. }));
  }

  #[tokio::test]
  async fn test_open_story_with_comments() {
    let mock = MockTransport::new();
    mock
      .item(json!({"id": 1, "type": "story", "title": "Launch", "kids": [2, 3]}))
      .item(json!({"id": 2, "type": "comment", "parent": 1, "time": 10}))
      .item(json!({"id": 3, "type": "comment", "parent": 1, "time": 20}));
    let (session, mut events) = session(&mock, false);

    let item = session.open_item(1).await.expect("item");
    assert_eq!(item.title.as_deref(), Some("Launch"));

    let events = events.drain();
    match &events[0] {
      Event::ItemDetails {
        item,
        poll_options,
        parent,
      } => {
        assert_eq!(item.id, 1);
        assert!(poll_options.is_empty());
        assert!(parent.is_none());
      }
      other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(tree_ids(&events), Some(vec![3, 2]));
  }

  #[tokio::test]
  async fn test_open_comment_resolves_parent() {
    let mock = MockTransport::new();
    mock
      .item(json!({"id": 1, "type": "story"}))
      .item(json!({"id": 2, "type": "comment", "parent": 1}));
    let (session, mut events) = session(&mock, false);

    session.open_item(2).await.expect("item");
    let parent = events.drain().into_iter().find_map(|e| match e {
      Event::ItemDetails { parent, .. } => parent,
      _ => None,
    });
    assert_eq!(parent.map(|p| p.id), Some(1));
  }

  #[tokio::test]
  async fn test_open_poll_resolves_options() {
    let mock = MockTransport::new();
    mock
      .item(json!({"id": 10, "type": "poll", "parts": [11, 12]}))
      .item(json!({"id": 11, "type": "pollopt", "text": "Rust"}))
      .item(json!({"id": 12, "type": "pollopt", "text": "Go"}));
    let (session, mut events) = session(&mock, false);

    session.open_item(10).await.expect("poll");
    let options = events.drain().into_iter().find_map(|e| match e {
      Event::ItemDetails { poll_options, .. } => Some(poll_options),
      _ => None,
    });
    let ids: Vec<_> = options.expect("details").iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![11, 12]);
  }

  #[tokio::test]
  async fn test_unavailable_items() {
    let mock = MockTransport::new();
    mock.item(json!({"id": 5, "type": "story", "deleted": true}));
    let (session, mut events) = session(&mock, false);

    assert!(session.open_item(5).await.is_none());
    assert!(session.open_item(6).await.is_none());
    assert!(session.open_comments(6).await.is_none());

    let ids: Vec<_> = events
      .drain()
      .into_iter()
      .map(|e| match e {
        Event::ItemUnavailable { id } => id,
        other => panic!("unexpected event {:?}", other),
      })
      .collect();
    assert_eq!(ids, vec![5, 6, 6]);
  }

  #[tokio::test]
  async fn test_expand_reemits_tree() {
    let mock = MockTransport::new();
    mock
      .item(json!({"id": 1, "type": "story", "kids": [2]}))
      .item(json!({"id": 2, "type": "comment", "parent": 1, "kids": [3]}))
      .item(json!({"id": 3, "type": "comment", "parent": 2, "kids": [4]}))
      .item(json!({"id": 4, "type": "comment", "parent": 3}));
    let (session, mut events) = session(&mock, false);

    assert_eq!(session.expand(3).await, ExpandOutcome::NotFound);
    assert_eq!(session.open_comments(1).await, Some(2));
    events.drain();

    assert_eq!(session.expand(3).await, ExpandOutcome::Expanded(1));
    assert_eq!(tree_ids(&events.drain()), Some(vec![2]));

    let thread = session.thread().await.expect("thread");
    assert_eq!(thread.len(), 3);
    assert_eq!(thread.find(4).map(|n| n.depth), Some(2));
  }

  #[tokio::test]
  async fn test_refresh_refetches() {
    let mock = MockTransport::new();
    mock
      .reply("/v0/topstories.json", json!([1]))
      .item(json!({"id": 1, "type": "story"}));
    let (session, _events) = session(&mock, false);

    session.select_feed(FeedType::TopStories).await;
    mock
      .reply("/v0/topstories.json", json!([2, 1]))
      .item(json!({"id": 2, "type": "story"}));

    let items = session.refresh().await;
    let ids: Vec<_> = items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(mock.calls("/v0/topstories.json"), 2);
    assert_eq!(mock.calls("/v0/item/1.json"), 2);
    assert_eq!(session.poller().last_known_top(), vec![2, 1]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_live_lifecycle() {
    let mock = MockTransport::new();
    mock.reply("/v0/newstories.json", json!([1]));
    let (session, mut events) = session(&mock, true);

    session.start().await;
    assert!(session.poller().is_active());
    session.set_visible(false);
    assert!(!session.poller().is_active());
    session.set_visible(true);
    session.shutdown().await;
    assert!(!session.poller().is_active());

    let statuses: Vec<_> = events
      .drain()
      .into_iter()
      .filter_map(|e| match e {
        Event::LiveStatus(status) => Some(status),
        _ => None,
      })
      .collect();
    assert_eq!(
      statuses,
      vec![
        LiveStatus::Active,
        LiveStatus::Paused,
        LiveStatus::Active,
        LiveStatus::Paused
      ]
    );
  }
}
