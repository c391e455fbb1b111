use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Global item identity.
pub type ItemId = u64;

const ITEM_PAGE: &str = "https://news.ycombinator.com/item?id=";

/// Remote collections of item ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
  #[serde(alias = "top")]
  TopStories,
  #[default]
  #[serde(alias = "new")]
  NewStories,
  #[serde(alias = "best")]
  BestStories,
  #[serde(alias = "ask")]
  AskStories,
  #[serde(alias = "show")]
  ShowStories,
  #[serde(alias = "job", alias = "jobs")]
  JobStories,
}

impl FeedType {
  pub const ALL: [FeedType; 6] = [
    FeedType::TopStories,
    FeedType::NewStories,
    FeedType::BestStories,
    FeedType::AskStories,
    FeedType::ShowStories,
    FeedType::JobStories,
  ];

  /// Endpoint name, as in `{base}/{endpoint}.json`
  pub fn endpoint(self) -> &'static str {
    match self {
      FeedType::TopStories => "topstories",
      FeedType::NewStories => "newstories",
      FeedType::BestStories => "beststories",
      FeedType::AskStories => "askstories",
      FeedType::ShowStories => "showstories",
      FeedType::JobStories => "jobstories",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      FeedType::TopStories => "Top",
      FeedType::NewStories => "New",
      FeedType::BestStories => "Best",
      FeedType::AskStories => "Ask HN",
      FeedType::ShowStories => "Show HN",
      FeedType::JobStories => "Jobs",
    }
  }
}

impl fmt::Display for FeedType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.endpoint())
  }
}

impl FromStr for FeedType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "top" | "topstories" => Ok(FeedType::TopStories),
      "new" | "newstories" => Ok(FeedType::NewStories),
      "best" | "beststories" => Ok(FeedType::BestStories),
      "ask" | "askstories" => Ok(FeedType::AskStories),
      "show" | "showstories" => Ok(FeedType::ShowStories),
      "job" | "jobs" | "jobstories" => Ok(FeedType::JobStories),
      other => Err(format!("unknown feed type: {}", other)),
    }
  }
}

/// Item classification. `Ask` is only ever inferred, never sent by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
  Story,
  Ask,
  Comment,
  Job,
  Poll,
  #[serde(rename = "pollopt")]
  PollOption,
}

impl ItemKind {
  /// Parse the API `type` field. Unknown values yield `None`.
  pub fn from_wire(value: &str) -> Option<Self> {
    match value {
      "story" => Some(ItemKind::Story),
      "comment" => Some(ItemKind::Comment),
      "job" => Some(ItemKind::Job),
      "poll" => Some(ItemKind::Poll),
      "pollopt" => Some(ItemKind::PollOption),
      "ask" => Some(ItemKind::Ask),
      _ => None,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      ItemKind::Story => "Story",
      ItemKind::Ask => "Ask HN",
      ItemKind::Comment => "Comment",
      ItemKind::Job => "Job",
      ItemKind::Poll => "Poll",
      ItemKind::PollOption => "Poll option",
    }
  }
}

/// A story, comment, job, poll, or poll option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
  pub id: ItemId,
  pub kind: ItemKind,
  pub by: Option<String>,
  /// Unix seconds
  pub time: Option<i64>,
  pub text: Option<String>,
  pub title: Option<String>,
  pub url: Option<String>,
  pub score: i64,
  pub descendants: Option<u64>,
  pub kids: Vec<ItemId>,
  pub parts: Vec<ItemId>,
  pub parent: Option<ItemId>,
  pub deleted: bool,
  pub dead: bool,
}

impl Item {
  /// Deleted and dead items are never shown.
  pub fn is_visible(&self) -> bool {
    !self.deleted && !self.dead
  }

  pub fn has_kids(&self) -> bool {
    !self.kids.is_empty()
  }

  pub fn posted_at(&self) -> Option<DateTime<Utc>> {
    self.time.and_then(|t| DateTime::from_timestamp(t, 0))
  }

  /// Discussion page on the site.
  pub fn permalink(&self) -> String {
    format!("{}{}", ITEM_PAGE, self.id)
  }

  /// Outbound link, falling back to the discussion page.
  pub fn link(&self) -> String {
    self.url.clone().unwrap_or_else(|| self.permalink())
  }

  /// Host of the outbound link without a leading `www.`
  pub fn domain(&self) -> Option<String> {
    let url = Url::parse(self.url.as_deref()?).ok()?;
    let host = url.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
  }

  pub fn comment_count(&self) -> u64 {
    self.descendants.unwrap_or(self.kids.len() as u64)
  }
}

/// Payload of the `updates.json` endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Updates {
  #[serde(default)]
  pub items: Vec<ItemId>,
  #[serde(default)]
  pub profiles: Vec<String>,
}
