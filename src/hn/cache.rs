//! Cache keys and values for item API resources.

use std::fmt;
use std::sync::Arc;

use super::types::{FeedType, Item, ItemId, Updates};

/// Identity of a remote resource, used for both caching and coalescing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
  IdList(FeedType),
  Item(ItemId),
  Updates,
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::IdList(feed) => write!(f, "idlist:{}", feed),
      Self::Item(id) => write!(f, "item:{}", id),
      Self::Updates => f.write_str("updates"),
    }
  }
}

/// A decoded resource as held by the shared cache.
#[derive(Debug, Clone)]
pub enum Resource {
  IdList(Arc<[ItemId]>),
  Item(Arc<Item>),
  Updates(Arc<Updates>),
}

impl Resource {
  pub fn into_id_list(self) -> Option<Arc<[ItemId]>> {
    match self {
      Self::IdList(ids) => Some(ids),
      _ => None,
    }
  }

  pub fn into_item(self) -> Option<Arc<Item>> {
    match self {
      Self::Item(item) => Some(item),
      _ => None,
    }
  }

  pub fn into_updates(self) -> Option<Arc<Updates>> {
    match self {
      Self::Updates(updates) => Some(updates),
      _ => None,
    }
  }
}
