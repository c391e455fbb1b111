//! Paginated feed controller.
//!
//! Owns the ordered id list of the selected feed and reveals it batch by
//! batch. The first batch loads as part of selecting a feed; later batches
//! load when the presentation layer asks for them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::cache::lock;
use crate::event::{Event, EventSink};
use crate::hn::{CachedHnClient, FeedType, Item, ItemId};

/// Default number of ids requested per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Lifecycle of the selected feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
  /// No feed selected yet
  Empty,
  /// Fetching the id list
  Listing,
  /// Some ids not yet requested
  Partial,
  /// Every id requested
  Complete,
}

#[derive(Debug)]
struct FeedState {
  feed: FeedType,
  /// Bumped on every selection; batches from older generations are dropped
  generation: u64,
  selected: bool,
  listing: bool,
  ordered_ids: Arc<[ItemId]>,
  loaded_count: usize,
  seen_ids: HashSet<ItemId>,
  items: Vec<Arc<Item>>,
}

impl FeedState {
  fn new(feed: FeedType) -> Self {
    Self {
      feed,
      generation: 0,
      selected: false,
      listing: false,
      ordered_ids: Arc::from(Vec::new()),
      loaded_count: 0,
      seen_ids: HashSet::new(),
      items: Vec::new(),
    }
  }

  fn phase(&self) -> FeedPhase {
    if !self.selected {
      FeedPhase::Empty
    } else if self.listing {
      FeedPhase::Listing
    } else if self.loaded_count >= self.ordered_ids.len() {
      FeedPhase::Complete
    } else {
      FeedPhase::Partial
    }
  }
}

/// Incrementally reveals one feed at a time.
///
/// Cheap to clone; clones drive the same feed state.
#[derive(Clone)]
pub struct FeedController {
  client: CachedHnClient,
  state: Arc<Mutex<FeedState>>,
  /// Serialises batch loads so batches append in id-list order
  batch_gate: Arc<tokio::sync::Mutex<()>>,
  batch_size: usize,
  events: EventSink,
}

impl FeedController {
  pub fn new(client: CachedHnClient, batch_size: usize, events: EventSink) -> Self {
    Self {
      client,
      state: Arc::new(Mutex::new(FeedState::new(FeedType::default()))),
      batch_gate: Arc::new(tokio::sync::Mutex::new(())),
      batch_size: batch_size.max(1),
      events,
    }
  }

  /// Replace the feed state with a fresh one for `feed` and load its first
  /// batch.
  ///
  /// Batches still in flight for the previous state complete, but their
  /// items are dropped.
  pub async fn select_feed(&self, feed: FeedType) -> Vec<Arc<Item>> {
    let generation = {
      let mut state = lock(&self.state);
      let generation = state.generation + 1;
      *state = FeedState {
        generation,
        selected: true,
        listing: true,
        ..FeedState::new(feed)
      };
      generation
    };

    info!(%feed, "selecting feed");
    let ids = self.client.fetch_id_list(feed).await;

    {
      let mut state = lock(&self.state);
      if state.generation != generation {
        debug!(%feed, "feed replaced while listing");
        return Vec::new();
      }
      info!(%feed, count = ids.len(), "id list loaded");
      state.ordered_ids = ids;
      state.listing = false;
      if state.ordered_ids.is_empty() {
        drop(state);
        self.events.emit(Event::FeedExhausted { feed });
        return Vec::new();
      }
    }

    self.load_next_batch().await
  }

  /// Load the next batch using the configured batch size.
  pub async fn load_next_batch(&self) -> Vec<Arc<Item>> {
    self.load_batch(self.batch_size).await
  }

  /// Request the next `batch_size` ids of the feed.
  ///
  /// The cursor advances over every requested id, so ids that fail to
  /// resolve or are deleted/dead are skipped for good. Survivors are
  /// returned (and announced) in id-list order, whatever order the fetches
  /// complete in. A no-op once the feed is exhausted.
  pub async fn load_batch(&self, batch_size: usize) -> Vec<Arc<Item>> {
    let _gate = self.batch_gate.lock().await;

    let (feed, generation, ids) = {
      let mut state = lock(&self.state);
      if state.listing {
        return Vec::new();
      }
      let start = state.loaded_count.min(state.ordered_ids.len());
      let end = (start + batch_size).min(state.ordered_ids.len());
      if start == end {
        return Vec::new();
      }
      let ids = state.ordered_ids[start..end].to_vec();
      state.loaded_count = end;
      (state.feed, state.generation, ids)
    };

    debug!(%feed, ?ids, "loading batch");
    let fetched = self.client.fetch_items(&ids).await;

    let (batch, exhausted) = {
      let mut state = lock(&self.state);
      if state.generation != generation {
        debug!(%feed, "dropping batch for replaced feed");
        return Vec::new();
      }

      let mut batch = Vec::with_capacity(fetched.len());
      for item in fetched.into_iter().flatten() {
        if !item.is_visible() || !state.seen_ids.insert(item.id) {
          continue;
        }
        batch.push(item);
      }
      state.items.extend(batch.iter().cloned());
      (batch, state.loaded_count >= state.ordered_ids.len())
    };

    info!(
      %feed,
      requested = ids.len(),
      loaded = batch.len(),
      "batch loaded"
    );
    self.events.emit(Event::BatchLoaded {
      feed,
      items: batch.clone(),
    });
    if exhausted {
      self.events.emit(Event::FeedExhausted { feed });
    }

    batch
  }

  /// Whether another batch can be requested.
  pub fn has_more(&self) -> bool {
    let state = lock(&self.state);
    !state.listing && state.loaded_count < state.ordered_ids.len()
  }

  pub fn phase(&self) -> FeedPhase {
    lock(&self.state).phase()
  }

  pub fn feed(&self) -> FeedType {
    lock(&self.state).feed
  }

  pub fn loaded_count(&self) -> usize {
    lock(&self.state).loaded_count
  }

  pub fn ordered_ids(&self) -> Arc<[ItemId]> {
    Arc::clone(&lock(&self.state).ordered_ids)
  }

  /// The first `k` ids of the current list.
  pub fn top_ids(&self, k: usize) -> Vec<ItemId> {
    lock(&self.state).ordered_ids.iter().take(k).copied().collect()
  }

  /// Items shown so far, in feed order.
  pub fn items(&self) -> Vec<Arc<Item>> {
    lock(&self.state).items.clone()
  }

  pub fn has_seen(&self, id: ItemId) -> bool {
    lock(&self.state).seen_ids.contains(&id)
  }
}
