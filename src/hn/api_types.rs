//! Serde-deserializable types matching the item API responses.
//!
//! Kept apart from the domain types so that missing fields, defaults and
//! type inference are handled in one place.

use serde::Deserialize;

use super::types::{Item, ItemId, ItemKind};

const JOB_WORDS: [&str; 4] = ["hiring", "job", "remote", "freelance"];

#[derive(Debug, Deserialize)]
pub struct ApiItem {
  pub id: ItemId,
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub by: Option<String>,
  pub time: Option<i64>,
  pub text: Option<String>,
  pub title: Option<String>,
  pub url: Option<String>,
  pub score: Option<i64>,
  pub descendants: Option<u64>,
  #[serde(default)]
  pub kids: Vec<ItemId>,
  #[serde(default)]
  pub parts: Vec<ItemId>,
  pub parent: Option<ItemId>,
  #[serde(default)]
  pub deleted: bool,
  #[serde(default)]
  pub dead: bool,
}

impl ApiItem {
  pub fn into_item(self) -> Item {
    let kind = self
      .kind
      .as_deref()
      .and_then(ItemKind::from_wire)
      .unwrap_or_else(|| self.infer_kind());

    Item {
      id: self.id,
      kind,
      by: self.by,
      time: self.time,
      text: self.text,
      title: self.title,
      url: self.url,
      score: self.score.unwrap_or(0),
      descendants: self.descendants,
      kids: self.kids,
      parts: self.parts,
      parent: self.parent,
      deleted: self.deleted,
      dead: self.dead,
    }
  }

  /// Classify an item the API sent without a usable `type`.
  fn infer_kind(&self) -> ItemKind {
    let title = self.title.as_deref().unwrap_or_default().to_lowercase();

    if title.starts_with("ask hn:") || title.starts_with("ask hacker news:") {
      ItemKind::Ask
    } else if JOB_WORDS.iter().any(|word| title.contains(word)) {
      ItemKind::Job
    } else if !self.parts.is_empty() {
      ItemKind::Poll
    } else if self.parent.is_some() {
      ItemKind::Comment
    } else {
      ItemKind::Story
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn parse(value: serde_json::Value) -> Item {
    serde_json::from_value::<ApiItem>(value)
      .expect("valid item")
      .into_item()
  }

  #[test]
  fn test_explicit_type_wins() {
    let item = parse(json!({"id": 1, "type": "story", "title": "Ask HN: anything?"}));
    assert_eq!(item.kind, ItemKind::Story);
  }

  #[test]
  fn test_infers_ask() {
    assert_eq!(parse(json!({"id": 1, "title": "Ask HN: test"})).kind, ItemKind::Ask);
    assert_eq!(
      parse(json!({"id": 1, "title": "ASK HACKER NEWS: caps"})).kind,
      ItemKind::Ask
    );
  }

  #[test]
  fn test_infers_job_from_title_words() {
    let item = parse(json!({"id": 1, "title": "Acme is Hiring engineers"}));
    assert_eq!(item.kind, ItemKind::Job);
    let item = parse(json!({"id": 1, "title": "Freelancers welcome"}));
    assert_eq!(item.kind, ItemKind::Job);
  }

  #[test]
  fn test_infers_poll_comment_story() {
    assert_eq!(parse(json!({"id": 1, "parts": [2, 3]})).kind, ItemKind::Poll);
    assert_eq!(parse(json!({"id": 1, "parent": 5})).kind, ItemKind::Comment);
    assert_eq!(parse(json!({"id": 1, "title": "Show me"})).kind, ItemKind::Story);
  }

  #[test]
  fn test_unknown_type_falls_back_to_inference() {
    let item = parse(json!({"id": 1, "type": "mystery", "parent": 9}));
    assert_eq!(item.kind, ItemKind::Comment);
  }

  #[test]
  fn test_defaults() {
    let item = parse(json!({"id": 7, "type": "comment"}));
    assert_eq!(item.score, 0);
    assert!(item.kids.is_empty());
    assert!(!item.deleted && !item.dead);
    assert_eq!(item.time, None);
  }
}
