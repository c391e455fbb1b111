use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::comments::TreeLimits;
use crate::hn::FeedType;
use crate::live::{DetectStrategy, LiveSettings};

pub const DEFAULT_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";

/// Environment variable that replaces `api.base_url`
pub const API_BASE_ENV: &str = "HNFEED_API_BASE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub feed: FeedConfig,
  pub cache: CacheConfig,
  pub comments: CommentsConfig,
  pub live: LiveConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub user_agent: String,
  /// Per-request timeout; none by default
  pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_API_BASE.to_string(),
      user_agent: concat!("hnfeed/", env!("CARGO_PKG_VERSION")).to_string(),
      timeout_secs: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
  /// Feed selected at startup (endpoint name or alias)
  pub default: FeedType,
  pub batch_size: usize,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      default: FeedType::default(),
      batch_size: crate::feed::DEFAULT_BATCH_SIZE,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub ttl_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_ms: crate::cache::DEFAULT_TTL.as_millis() as u64,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
  pub max_depth: usize,
  /// Levels below this depth are fetched with their parent
  pub eager_depth: usize,
}

impl Default for CommentsConfig {
  fn default() -> Self {
    let limits = TreeLimits::default();
    Self {
      max_depth: limits.max_depth,
      eager_depth: limits.eager_depth,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
  pub enabled: bool,
  pub interval_ms: u64,
  pub throttle_ms: u64,
  pub top_k: usize,
  pub strategy: DetectStrategy,
}

impl Default for LiveConfig {
  fn default() -> Self {
    let settings = LiveSettings::default();
    Self {
      enabled: true,
      interval_ms: settings.interval.as_millis() as u64,
      throttle_ms: settings.throttle.as_millis() as u64,
      top_k: settings.top_k,
      strategy: settings.strategy,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./hnfeed.yaml (current directory)
  /// 3. `<config dir>/hnfeed/config.yaml`, where the config dir is the
  ///    platform's (`$XDG_CONFIG_HOME` or `~/.config` on Linux)
  ///
  /// Without a file the defaults apply. `HNFEED_API_BASE` overrides the
  /// API base either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(base) = std::env::var(API_BASE_ENV) {
      if !base.trim().is_empty() {
        config.api.base_url = base;
      }
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("hnfeed.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("hnfeed").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty document deserialises as unit, not as an empty mapping
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  pub fn validate(&self) -> Result<()> {
    if self.feed.batch_size == 0 {
      return Err(eyre!("feed.batch_size must be greater than 0"));
    }
    if self.live.top_k == 0 {
      return Err(eyre!("live.top_k must be greater than 0"));
    }
    if self.comments.max_depth == 0 {
      return Err(eyre!("comments.max_depth must be greater than 0"));
    }
    if self.comments.eager_depth > self.comments.max_depth {
      return Err(eyre!(
        "comments.eager_depth ({}) must not exceed comments.max_depth ({})",
        self.comments.eager_depth,
        self.comments.max_depth
      ));
    }
    Ok(())
  }

  pub fn cache_ttl(&self) -> Duration {
    Duration::from_millis(self.cache.ttl_ms)
  }

  pub fn request_timeout(&self) -> Option<Duration> {
    self.api.timeout_secs.map(Duration::from_secs)
  }

  pub fn tree_limits(&self) -> TreeLimits {
    TreeLimits {
      max_depth: self.comments.max_depth,
      eager_depth: self.comments.eager_depth,
    }
  }

  pub fn live_settings(&self) -> LiveSettings {
    LiveSettings {
      interval: Duration::from_millis(self.live.interval_ms),
      throttle: Duration::from_millis(self.live.throttle_ms),
      top_k: self.live.top_k,
      strategy: self.live.strategy,
    }
  }
}
