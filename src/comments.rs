//! Depth-bounded comment trees with lazy expansion.
//!
//! A thread is built level by level: every id of a level is fetched
//! concurrently, deleted and dead comments are dropped, and survivors are
//! ordered newest first. Only the first `eager_depth` levels are resolved up
//! front. Deeper levels wait for an explicit expand, and nothing at or below
//! `max_depth` is ever resolved.

use futures::future::{join_all, BoxFuture, FutureExt};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::cache::lock;
use crate::hn::{CachedHnClient, Item, ItemId};

/// Depth at which comment resolution stops for good.
pub const MAX_DEPTH: usize = 5;
/// Levels resolved without an expand request.
pub const EAGER_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLimits {
  pub max_depth: usize,
  pub eager_depth: usize,
}

impl Default for TreeLimits {
  fn default() -> Self {
    Self {
      max_depth: MAX_DEPTH,
      eager_depth: EAGER_DEPTH,
    }
  }
}

/// Replies under a comment
#[derive(Debug, Clone)]
pub enum Children {
  /// The comment has no replies
  None,
  /// Replies exist but wait for an expand request
  Lazy,
  /// Replies exist past the depth limit and will never be resolved
  Truncated,
  Resolved(Vec<CommentNode>),
}

#[derive(Debug, Clone)]
pub struct CommentNode {
  pub item: Arc<Item>,
  pub depth: usize,
  pub children: Children,
}

impl CommentNode {
  pub fn id(&self) -> ItemId {
    self.item.id
  }

  /// Number of direct replies the API lists, resolved or not.
  pub fn reply_count(&self) -> usize {
    self.item.kids.len()
  }

  /// Resolved replies, empty while lazy or truncated.
  pub fn replies(&self) -> &[CommentNode] {
    match &self.children {
      Children::Resolved(nodes) => nodes,
      _ => &[],
    }
  }

  pub fn can_expand(&self) -> bool {
    matches!(self.children, Children::Lazy)
  }

  fn find(&self, id: ItemId) -> Option<&CommentNode> {
    if self.id() == id {
      return Some(self);
    }
    self.replies().iter().find_map(|child| child.find(id))
  }

  fn find_mut(&mut self, id: ItemId) -> Option<&mut CommentNode> {
    if self.id() == id {
      return Some(self);
    }
    match &mut self.children {
      Children::Resolved(nodes) => nodes.iter_mut().find_map(|child| child.find_mut(id)),
      _ => None,
    }
  }

  fn count(&self) -> usize {
    1 + self.replies().iter().map(CommentNode::count).sum::<usize>()
  }

  fn deepest(&self) -> usize {
    self
      .replies()
      .iter()
      .map(CommentNode::deepest)
      .max()
      .unwrap_or(self.depth)
  }
}

/// Ids already claimed by one traversal. Guards against `kids` cycles.
#[derive(Debug, Clone, Default)]
struct Visited(Arc<Mutex<HashSet<ItemId>>>);

impl Visited {
  /// Returns false if the id was claimed before.
  fn claim(&self, id: ItemId) -> bool {
    lock(&self.0).insert(id)
  }
}

/// Result of an expand request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
  /// Replies resolved; holds how many survived filtering
  Expanded(usize),
  AlreadyResolved,
  NoReplies,
  Truncated,
  NotFound,
}

/// The comment tree under one story (or comment), kept for the session so
/// resolved replies are never fetched twice.
#[derive(Debug, Clone)]
pub struct CommentThread {
  parent_id: ItemId,
  roots: Vec<CommentNode>,
  visited: Visited,
}

impl CommentThread {
  pub fn parent_id(&self) -> ItemId {
    self.parent_id
  }

  pub fn roots(&self) -> &[CommentNode] {
    &self.roots
  }

  pub fn find(&self, id: ItemId) -> Option<&CommentNode> {
    self.roots.iter().find_map(|node| node.find(id))
  }

  fn find_mut(&mut self, id: ItemId) -> Option<&mut CommentNode> {
    self.roots.iter_mut().find_map(|node| node.find_mut(id))
  }

  /// Resolved comments in the thread.
  pub fn len(&self) -> usize {
    self.roots.iter().map(CommentNode::count).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.roots.is_empty()
  }

  /// Greatest depth of any resolved comment, `None` when empty.
  pub fn deepest(&self) -> Option<usize> {
    self.roots.iter().map(CommentNode::deepest).max()
  }
}

/// Resolves comment ids into trees through the shared cached client.
#[derive(Clone)]
pub struct CommentTreeBuilder {
  client: CachedHnClient,
  limits: TreeLimits,
}

impl CommentTreeBuilder {
  pub fn new(client: CachedHnClient, limits: TreeLimits) -> Self {
    Self { client, limits }
  }

  pub fn limits(&self) -> TreeLimits {
    self.limits
  }

  /// Build the tree for `ids` as siblings at `depth`.
  pub async fn build_tree(&self, ids: &[ItemId], depth: usize) -> Vec<CommentNode> {
    self.build_level(ids.to_vec(), depth, Visited::default()).await
  }

  /// Build the thread under `parent`, starting from its `kids`.
  pub async fn open_thread(&self, parent: &Item) -> CommentThread {
    let visited = Visited::default();
    visited.claim(parent.id);

    let roots = self.build_level(parent.kids.clone(), 0, visited.clone()).await;
    let thread = CommentThread {
      parent_id: parent.id,
      roots,
      visited,
    };
    info!(
      parent = parent.id,
      comments = thread.len(),
      "comment thread built"
    );
    thread
  }

  /// Resolve the replies of a lazy node, one level deep.
  pub async fn expand(&self, thread: &mut CommentThread, node_id: ItemId) -> ExpandOutcome {
    let (kids, depth) = match thread.find(node_id) {
      None => return ExpandOutcome::NotFound,
      Some(node) => match node.children {
        Children::None => return ExpandOutcome::NoReplies,
        Children::Truncated => return ExpandOutcome::Truncated,
        Children::Resolved(_) => return ExpandOutcome::AlreadyResolved,
        Children::Lazy => (node.item.kids.clone(), node.depth),
      },
    };

    let replies = self
      .build_level(kids, depth + 1, thread.visited.clone())
      .await;
    let count = replies.len();
    debug!(node = node_id, count, "expanded comment");

    match thread.find_mut(node_id) {
      Some(node) => {
        node.children = Children::Resolved(replies);
        ExpandOutcome::Expanded(count)
      }
      None => ExpandOutcome::NotFound,
    }
  }

  fn build_level(
    &self,
    ids: Vec<ItemId>,
    depth: usize,
    visited: Visited,
  ) -> BoxFuture<'_, Vec<CommentNode>> {
    async move {
      if depth >= self.limits.max_depth {
        return Vec::new();
      }

      let ids: Vec<ItemId> = ids.into_iter().filter(|&id| visited.claim(id)).collect();
      let mut items: Vec<Arc<Item>> = self
        .client
        .fetch_items(&ids)
        .await
        .into_iter()
        .flatten()
        .filter(|item| item.is_visible())
        .collect();

      // Newest first; stable, so equal times keep their order
      items.sort_by_key(|item| Reverse(item.time.unwrap_or(0)));

      let nodes = items.into_iter().map(|item| {
        let visited = visited.clone();
        async move {
          let children = self.children_of(&item, depth, visited).await;
          CommentNode {
            item,
            depth,
            children,
          }
        }
      });

      join_all(nodes).await
    }
    .boxed()
  }

  async fn children_of(&self, item: &Item, depth: usize, visited: Visited) -> Children {
    if item.kids.is_empty() {
      return Children::None;
    }

    let child_depth = depth + 1;
    if child_depth >= self.limits.max_depth {
      Children::Truncated
    } else if child_depth < self.limits.eager_depth {
      Children::Resolved(self.build_level(item.kids.clone(), child_depth, visited).await)
    } else {
      Children::Lazy
    }
  }
}
