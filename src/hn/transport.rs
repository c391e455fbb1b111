//! The asynchronous `GET url -> JSON` primitive everything else is built on.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a remote read produced no value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  #[error("network error: {0}")]
  Transport(String),
  #[error("unexpected HTTP status {0}")]
  Status(u16),
  #[error("malformed response: {0}")]
  Decode(String),
  #[error("invalid url: {0}")]
  Url(String),
}

impl From<serde_json::Error> for FetchError {
  fn from(err: serde_json::Error) -> Self {
    FetchError::Decode(err.to_string())
  }
}

impl From<url::ParseError> for FetchError {
  fn from(err: url::ParseError) -> Self {
    FetchError::Url(err.to_string())
  }
}

/// Fetches a URL and decodes its body as JSON.
///
/// Fails on network errors, non-2xx statuses and bodies that are not JSON.
pub trait Transport: Send + Sync + 'static {
  fn get_json(&self, url: Url) -> BoxFuture<'static, Result<Value, FetchError>>;
}

/// HTTP transport backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
    let mut builder = reqwest::Client::builder().user_agent(user_agent);
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }

    let client = builder
      .build()
      .map_err(|e| FetchError::Transport(e.to_string()))?;

    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  fn get_json(&self, url: Url) -> BoxFuture<'static, Result<Value, FetchError>> {
    let client = self.client.clone();
    async move {
      let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

      let status = response.status();
      if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
      }

      let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

      Ok(serde_json::from_slice(&body)?)
    }
    .boxed()
  }
}

#[cfg(test)]
pub(crate) mod testing {
  //! Scripted transport for exercising the fetch paths without a network.

  use super::*;
  use std::collections::HashMap;
  use std::sync::{Arc, Mutex};

  #[derive(Clone)]
  enum Reply {
    Json(Value),
    Fail(FetchError),
  }

  #[derive(Default)]
  struct Script {
    replies: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    calls: HashMap<String, usize>,
  }

  /// Serves canned JSON keyed by URL path (e.g. `/v0/item/1.json`).
  ///
  /// Unscripted paths answer `null`, like the real API does for unknown items.
  #[derive(Clone, Default)]
  pub struct MockTransport {
    script: Arc<Mutex<Script>>,
  }

  impl MockTransport {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn base_url() -> &'static str {
      "http://hn.test/v0"
    }

    pub fn reply(&self, path: &str, value: Value) -> &Self {
      self.lock().replies.insert(path.to_string(), Reply::Json(value));
      self
    }

    pub fn fail(&self, path: &str, error: FetchError) -> &Self {
      self.lock().replies.insert(path.to_string(), Reply::Fail(error));
      self
    }

    pub fn delay(&self, path: &str, delay: Duration) -> &Self {
      self.lock().delays.insert(path.to_string(), delay);
      self
    }

    pub fn item(&self, value: Value) -> &Self {
      let id = value["id"].as_u64().unwrap_or_default();
      self.reply(&format!("/v0/item/{}.json", id), value)
    }

    pub fn calls(&self, path: &str) -> usize {
      self.lock().calls.get(path).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
      self.lock().calls.values().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
      self.script.lock().expect("mock transport lock")
    }
  }

  impl Transport for MockTransport {
    fn get_json(&self, url: Url) -> BoxFuture<'static, Result<Value, FetchError>> {
      let path = url.path().to_string();
      let (reply, delay) = {
        let mut script = self.lock();
        *script.calls.entry(path.clone()).or_default() += 1;
        (
          script
            .replies
            .get(&path)
            .cloned()
            .unwrap_or(Reply::Json(Value::Null)),
          script.delays.get(&path).copied(),
        )
      };

      async move {
        if let Some(delay) = delay {
          tokio::time::sleep(delay).await;
        }
        match reply {
          Reply::Json(value) => Ok(value),
          Reply::Fail(error) => Err(error),
        }
      }
      .boxed()
    }
  }
}
