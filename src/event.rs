use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::comments::CommentNode;
use crate::hn::{FeedType, Item, ItemId};

/// Live update indicator shown by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
  /// Polling timer running
  Active,
  /// Polling stopped (explicit pause or visibility loss)
  Paused,
  /// A check is in flight
  Checking,
  /// Last check found nothing new
  UpToDate,
  /// Last check found ids the feed has not shown yet
  NewAvailable { count: usize },
  /// Last check failed; polling continues
  CheckFailed,
}

impl LiveStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      LiveStatus::Active => "active",
      LiveStatus::Paused => "paused",
      LiveStatus::Checking => "checking",
      LiveStatus::UpToDate => "up-to-date",
      LiveStatus::NewAvailable { .. } => "new-available",
      LiveStatus::CheckFailed => "checking-failed",
    }
  }

  /// Human readable detail for a status banner
  pub fn detail(&self) -> String {
    match self {
      LiveStatus::Active => "Live updates active".to_string(),
      LiveStatus::Paused => "Live updates paused".to_string(),
      LiveStatus::Checking => "Checking for new posts".to_string(),
      LiveStatus::UpToDate => "Data is up to date".to_string(),
      LiveStatus::NewAvailable { count: 1 } => "1 new post available".to_string(),
      LiveStatus::NewAvailable { count } => format!("{} new posts available", count),
      LiveStatus::CheckFailed => "Error checking for updates".to_string(),
    }
  }
}

impl fmt::Display for LiveStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Notifications from the core to the presentation layer
#[derive(Debug, Clone)]
pub enum Event {
  /// A batch of the active feed finished loading, in feed order
  BatchLoaded {
    feed: FeedType,
    items: Vec<Arc<Item>>,
  },
  /// Every id of the active feed has been requested
  FeedExhausted { feed: FeedType },
  /// Header data for an opened item
  ItemDetails {
    item: Arc<Item>,
    poll_options: Vec<Arc<Item>>,
    parent: Option<Arc<Item>>,
  },
  /// The requested item is missing, deleted or dead
  ItemUnavailable { id: ItemId },
  /// The comment tree under `parent_id` was built or grew
  CommentsReady {
    parent_id: ItemId,
    tree: Vec<CommentNode>,
  },
  LiveStatus(LiveStatus),
}

/// Sending half handed to every component that reports to the presentation.
///
/// Sends never fail from the caller's point of view: once the receiver is
/// gone, events are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
  tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
  pub fn emit(&self, event: Event) {
    // Ignore send errors - the presentation may have shut down
    let _ = self.tx.send(event);
  }
}

/// Receiving half, owned by the presentation layer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }

  /// Take an event if one is already queued
  pub fn try_next(&mut self) -> Option<Event> {
    self.rx.try_recv().ok()
  }

  /// Drain every queued event
  pub fn drain(&mut self) -> Vec<Event> {
    std::iter::from_fn(|| self.try_next()).collect()
  }
}

/// Create a connected sink/handler pair
pub fn channel() -> (EventSink, EventHandler) {
  let (tx, rx) = mpsc::unbounded_channel();
  (EventSink { tx }, EventHandler { rx })
}
