//! Upstream price API adapters

mod client;

pub use client::HermesClient;

use async_trait::async_trait;

use crate::shared::errors::FetchError;
use crate::shared::types::{FeedId, RawQuote};

/// One request against the upstream API, no retries
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Latest snapshot entries for `ids`, in upstream order
    async fn latest_price_feeds(&self, ids: &[FeedId]) -> Result<Vec<RawQuote>, FetchError>;

    /// Base64 attestation blobs for `ids`
    async fn latest_vaas(&self, ids: &[FeedId]) -> Result<Vec<String>, FetchError>;
}
