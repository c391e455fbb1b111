//! Client for the Hacker News item API.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod transport;
pub mod types;

pub use cached_client::CachedHnClient;
pub use client::HnClient;
pub use transport::{FetchError, HttpTransport, Transport};
pub use types::{FeedType, Item, ItemId, ItemKind, Updates};
