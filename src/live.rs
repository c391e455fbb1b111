//! Live update detection for the active feed.
//!
//! While enabled and visible, a background task re-reads the head of the
//! feed's id list on a fixed interval and reports whether ids appeared that
//! the feed has not shown. Every check, timed or manual, passes a throttle.

use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::lock;
use crate::event::{Event, EventSink, LiveStatus};
use crate::feed::{FeedController, FeedPhase};
use crate::hn::{CachedHnClient, ItemId};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30_000);
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(500);
pub const DEFAULT_TOP_K: usize = 10;

/// How a check decides that something new exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectStrategy {
  /// Compare the first K ids of the fresh list with the known head
  #[default]
  HeadDiff,
  /// Count changed ids from `updates.json` that the feed has not shown
  Updates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSettings {
  pub interval: Duration,
  pub throttle: Duration,
  pub top_k: usize,
  pub strategy: DetectStrategy,
}

impl Default for LiveSettings {
  fn default() -> Self {
    Self {
      interval: DEFAULT_INTERVAL,
      throttle: DEFAULT_THROTTLE,
      top_k: DEFAULT_TOP_K,
      strategy: DetectStrategy::default(),
    }
  }
}

/// Outcome of one successful check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCheck {
  pub has_new: bool,
  pub new_count: usize,
  /// Head of the fresh list (empty for the updates strategy)
  pub fresh_top: Vec<ItemId>,
}

/// Compare the first `k` ids of `fresh` against the first `k` of `old`.
pub fn diff_top(old: &[ItemId], fresh: &[ItemId], k: usize) -> LiveCheck {
  let known: HashSet<ItemId> = old.iter().take(k).copied().collect();
  let fresh_top: Vec<ItemId> = fresh.iter().take(k).copied().collect();
  let new_count = fresh_top.iter().filter(|id| !known.contains(id)).count();

  LiveCheck {
    has_new: new_count > 0,
    new_count,
    fresh_top,
  }
}

/// Enforces a minimum spacing between calls.
#[derive(Debug)]
pub struct Throttle {
  spacing: Duration,
  last: Option<Instant>,
}

impl Throttle {
  pub fn new(spacing: Duration) -> Self {
    Self {
      spacing,
      last: None,
    }
  }

  /// Returns true, and starts a new window, if the last accepted call is at
  /// least `spacing` ago.
  pub fn try_acquire(&mut self) -> bool {
    let now = Instant::now();
    match self.last {
      Some(last) if now.duration_since(last) < self.spacing => false,
      _ => {
        self.last = Some(now);
        true
      }
    }
  }
}

struct Runner {
  stop: watch::Sender<bool>,
  handle: JoinHandle<()>,
}

struct PollState {
  /// Head of the feed as last shown; the baseline for head diffs
  last_known_top: Vec<ItemId>,
  enabled: bool,
  visible: bool,
  runner: Option<Runner>,
}

/// Throttled, pausable poller for the active feed.
///
/// Cheap to clone; clones control the same poller. The timer task only
/// holds a weak reference, so it stops once every clone is dropped.
#[derive(Clone)]
pub struct LivePoller {
  inner: Arc<PollerInner>,
}

struct PollerInner {
  client: CachedHnClient,
  feed: FeedController,
  settings: LiveSettings,
  state: Mutex<PollState>,
  throttle: Mutex<Throttle>,
  events: EventSink,
}

impl LivePoller {
  pub fn new(
    client: CachedHnClient,
    feed: FeedController,
    settings: LiveSettings,
    events: EventSink,
  ) -> Self {
    Self {
      inner: Arc::new(PollerInner {
        client,
        feed,
        settings,
        state: Mutex::new(PollState {
          last_known_top: Vec::new(),
          enabled: false,
          visible: true,
          runner: None,
        }),
        throttle: Mutex::new(Throttle::new(settings.throttle)),
        events,
      }),
    }
  }

  pub fn settings(&self) -> LiveSettings {
    self.inner.settings
  }

  /// Turn polling on or off (the user's preference).
  pub fn set_enabled(&self, enabled: bool) {
    lock(&self.inner.state).enabled = enabled;
    self.sync_runner();
  }

  /// Pause while hidden; resume on return if still enabled.
  pub fn set_visible(&self, visible: bool) {
    lock(&self.inner.state).visible = visible;
    self.sync_runner();
  }

  pub fn is_enabled(&self) -> bool {
    lock(&self.inner.state).enabled
  }

  /// Whether the timer is currently running.
  pub fn is_active(&self) -> bool {
    lock(&self.inner.state).runner.is_some()
  }

  /// Take the feed's current head as the baseline for future checks.
  pub fn rebase(&self) {
    let top = self.inner.feed.top_ids(self.inner.settings.top_k);
    debug!(?top, "live baseline reset");
    lock(&self.inner.state).last_known_top = top;
  }

  pub fn last_known_top(&self) -> Vec<ItemId> {
    lock(&self.inner.state).last_known_top.clone()
  }

  /// Run a check now, subject to the throttle.
  ///
  /// Returns `None` when no feed is loaded yet, when throttled, or when the
  /// check failed.
  pub async fn check_now(&self) -> Option<LiveCheck> {
    if matches!(self.inner.feed.phase(), FeedPhase::Empty | FeedPhase::Listing) {
      return None;
    }
    if !lock(&self.inner.throttle).try_acquire() {
      debug!("live check throttled");
      return None;
    }

    self.emit(LiveStatus::Checking);
    let check = match self.inner.settings.strategy {
      DetectStrategy::HeadDiff => self.check_head().await,
      DetectStrategy::Updates => self.check_updates().await,
    };

    match &check {
      Some(check) if check.has_new => {
        info!(count = check.new_count, "new posts available");
        self.emit(LiveStatus::NewAvailable {
          count: check.new_count,
        });
      }
      Some(_) => self.emit(LiveStatus::UpToDate),
      None => self.emit(LiveStatus::CheckFailed),
    }
    check
  }

  /// Stop polling and wait for a tick still in flight to finish.
  pub async fn shutdown(&self) {
    let runner = {
      let mut state = lock(&self.inner.state);
      state.enabled = false;
      state.runner.take()
    };

    if let Some(runner) = runner {
      let _ = runner.stop.send(true);
      let _ = runner.handle.await;
      self.emit(LiveStatus::Paused);
    }
  }

  async fn check_head(&self) -> Option<LiveCheck> {
    let feed = self.inner.feed.feed();
    let fresh = self.inner.client.fetch_id_list(feed).await;
    if fresh.is_empty() {
      warn!(%feed, "live check failed");
      return None;
    }

    // An empty baseline (the feed never listed) makes the whole head new
    let old = self.last_known_top();
    Some(diff_top(&old, &fresh, self.inner.settings.top_k))
  }

  async fn check_updates(&self) -> Option<LiveCheck> {
    let Some(updates) = self.inner.client.fetch_updates().await else {
      warn!("live check failed");
      return None;
    };

    let new_count = updates
      .items
      .iter()
      .filter(|&&id| !self.inner.feed.has_seen(id))
      .count();

    Some(LiveCheck {
      has_new: new_count > 0,
      new_count,
      fresh_top: Vec::new(),
    })
  }

  /// Start or stop the timer task to match `enabled && visible`.
  fn sync_runner(&self) {
    let mut state = lock(&self.inner.state);
    let wanted = state.enabled && state.visible;

    match (wanted, state.runner.is_some()) {
      (true, false) => {
        state.runner = Some(self.spawn_runner());
        drop(state);
        info!(interval = ?self.inner.settings.interval, "live updates started");
        self.emit(LiveStatus::Active);
      }
      (false, true) => {
        if let Some(runner) = state.runner.take() {
          // The task finishes a tick in flight, then exits
          let _ = runner.stop.send(true);
        }
        drop(state);
        info!("live updates paused");
        self.emit(LiveStatus::Paused);
      }
      _ => {}
    }
  }

  fn spawn_runner(&self) -> Runner {
    let (stop, mut stop_rx) = watch::channel(false);
    let inner = Arc::downgrade(&self.inner);
    let period = self.inner.settings.interval;

    let handle = tokio::spawn(async move {
      let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
      ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        tokio::select! {
          _ = ticks.tick() => {
            let Some(inner) = inner.upgrade() else {
              break;
            };
            let poller = LivePoller { inner };
            poller.check_now().await;
          }
          changed = stop_rx.changed() => {
            // Err: the poller was dropped along with the sender
            if changed.is_err() || *stop_rx.borrow() {
              break;
            }
          }
        }
      }
      debug!("live update task stopped");
    });

    Runner { stop, handle }
  }

  fn emit(&self, status: LiveStatus) {
    self.inner.events.emit(Event::LiveStatus(status));
  }
}
