//! Attestation relay: upstream blobs handed to an on-chain submitter

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::feed::{build_quote, FeedRegistry};
use crate::infrastructure::hermes::SnapshotSource;
use crate::infrastructure::retry::RetryPolicy;
use crate::shared::errors::RelayError;
use crate::shared::types::{FeedId, FeedSymbol, NormalizedQuote};

/// Price tuple as stored by the on-chain oracle contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OnChainPrice {
    pub price: i64,
    pub conf: u64,
    pub expo: i32,
    pub publish_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub accepted: bool,
    pub update_count: usize,
    pub fee: u128,
    /// Transaction hash or other submitter-specific reference
    pub reference: Option<String>,
}

/// Whatever accepts attestation blobs on chain.
///
/// Signing and ABI encoding live behind this trait.
#[async_trait]
pub trait AttestationSubmitter: Send + Sync {
    fn name(&self) -> &str;

    async fn update_fee(&self, updates: &[Vec<u8>]) -> Result<u128, RelayError>;

    async fn submit(&self, updates: Vec<Vec<u8>>, fee: u128) -> Result<SubmitReceipt, RelayError>;

    /// Re-read a feed after submission; `None` when the contract has no price
    async fn read_price(&self, feed_id: &FeedId) -> Result<Option<OnChainPrice>, RelayError>;
}

/// Records what would be submitted and never touches a chain
#[derive(Default)]
pub struct DryRunSubmitter {
    submitted: Mutex<Vec<Vec<u8>>>,
}

impl DryRunSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl AttestationSubmitter for DryRunSubmitter {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn update_fee(&self, _updates: &[Vec<u8>]) -> Result<u128, RelayError> {
        Ok(0)
    }

    async fn submit(&self, updates: Vec<Vec<u8>>, _fee: u128) -> Result<SubmitReceipt, RelayError> {
        let total: usize = updates.iter().map(Vec::len).sum();
        info!("📝 Dry run: would submit {} updates ({} bytes)", updates.len(), total);

        let update_count = updates.len();
        self.submitted.lock().extend(updates);
        Ok(SubmitReceipt {
            accepted: true,
            update_count,
            fee: 0,
            reference: None,
        })
    }

    async fn read_price(&self, _feed_id: &FeedId) -> Result<Option<OnChainPrice>, RelayError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayReport {
    pub submitter: String,
    pub symbols: Vec<FeedSymbol>,
    pub unknown: Vec<String>,
    pub receipt: SubmitReceipt,
    /// Prices read back from the chain, scaled like upstream quotes
    pub on_chain: BTreeMap<FeedSymbol, NormalizedQuote>,
}

pub struct PriceRelay {
    registry: Arc<FeedRegistry>,
    source: Arc<dyn SnapshotSource>,
    policy: RetryPolicy,
    submitter: Arc<dyn AttestationSubmitter>,
}

impl PriceRelay {
    pub fn new(
        registry: Arc<FeedRegistry>,
        source: Arc<dyn SnapshotSource>,
        policy: RetryPolicy,
        submitter: Arc<dyn AttestationSubmitter>,
    ) -> Self {
        Self {
            registry,
            source,
            policy,
            submitter,
        }
    }

    /// Fetch attestations for `symbols`, submit them, then read each feed back
    pub async fn relay(&self, symbols: &[String]) -> Result<RelayReport, RelayError> {
        let mut targets: Vec<(FeedSymbol, FeedId)> = Vec::new();
        let mut unknown = Vec::new();
        for raw in symbols {
            match FeedSymbol::parse(raw).and_then(|s| Ok((self.registry.resolve(s.as_str())?, s))) {
                Ok((id, symbol)) if !targets.iter().any(|(s, _)| s == &symbol) => targets.push((symbol, id)),
                Ok(_) => {}
                Err(e) => {
                    warn!("Not relaying {}: {}", raw, e);
                    unknown.push(raw.clone());
                }
            }
        }
        if targets.is_empty() {
            return Err(RelayError::Attestation("no known symbols to relay".to_string()));
        }

        let ids: Vec<FeedId> = targets.iter().map(|(_, id)| *id).collect();
        let encoded = self
            .policy
            .run("latest_vaas", || self.source.latest_vaas(&ids))
            .await?;
        let updates = decode_attestations(&encoded)?;
        debug!("Decoded {} attestations for {} feeds", updates.len(), ids.len());

        let fee = self.submitter.update_fee(&updates).await?;
        let receipt = self.submitter.submit(updates, fee).await?;
        if !receipt.accepted {
            return Err(RelayError::Submission(format!(
                "{} rejected the update",
                self.submitter.name()
            )));
        }

        let mut on_chain = BTreeMap::new();
        for (symbol, feed_id) in &targets {
            if let Some(price) = self.submitter.read_price(feed_id).await? {
                on_chain.insert(symbol.clone(), on_chain_quote(symbol.clone(), *feed_id, price)?);
            }
        }

        Ok(RelayReport {
            submitter: self.submitter.name().to_string(),
            symbols: targets.into_iter().map(|(symbol, _)| symbol).collect(),
            unknown,
            receipt,
            on_chain,
        })
    }
}

pub fn decode_attestations(encoded: &[String]) -> Result<Vec<Vec<u8>>, RelayError> {
    encoded
        .iter()
        .map(|blob| STANDARD.decode(blob.trim()).map_err(|e| RelayError::Decode(e.to_string())))
        .collect()
}

/// Scale an on-chain tuple the same way as an upstream snapshot entry
pub fn on_chain_quote(symbol: FeedSymbol, feed_id: FeedId, price: OnChainPrice) -> Result<NormalizedQuote, RelayError> {
    let publish_time = i64::try_from(price.publish_time)
        .map_err(|_| RelayError::Decode(format!("publish_time {} out of range", price.publish_time)))?;
    build_quote(
        symbol,
        feed_id,
        i128::from(price.price),
        i128::from(price.conf),
        price.expo,
        publish_time,
    )
    .map_err(|e| RelayError::Decode(e.to_string()))
}
