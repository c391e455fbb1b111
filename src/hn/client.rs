use std::sync::Arc;
use url::Url;

use super::api_types::ApiItem;
use super::transport::{FetchError, Transport};
use super::types::{FeedType, Item, ItemId, Updates};

/// Item API client. Stateless apart from the transport it reads through.
#[derive(Clone)]
pub struct HnClient {
  transport: Arc<dyn Transport>,
  base: Url,
}

impl HnClient {
  pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Result<Self, FetchError> {
    // Url::join drops the last path segment unless it ends with a slash
    let base = if base_url.ends_with('/') {
      Url::parse(base_url)?
    } else {
      Url::parse(&format!("{}/", base_url))?
    };

    Ok(Self { transport, base })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// Get the ordered id list of a feed
  pub async fn fetch_id_list(&self, feed: FeedType) -> Result<Vec<ItemId>, FetchError> {
    let url = self.base.join(&format!("{}.json", feed.endpoint()))?;
    let value = self.transport.get_json(url).await?;
    Ok(serde_json::from_value(value)?)
  }

  /// Get a single item. The API answers `null` for ids it does not know.
  pub async fn fetch_item(&self, id: ItemId) -> Result<Option<Item>, FetchError> {
    let url = self.base.join(&format!("item/{}.json", id))?;
    let value = self.transport.get_json(url).await?;
    let item: Option<ApiItem> = serde_json::from_value(value)?;
    Ok(item.map(ApiItem::into_item))
  }

  /// Get recently changed items and profiles
  pub async fn fetch_updates(&self) -> Result<Updates, FetchError> {
    let url = self.base.join("updates.json")?;
    let value = self.transport.get_json(url).await?;
    Ok(serde_json::from_value(value)?)
  }
}
