//! Application services - price source strategies

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::application::fetcher::SnapshotFetcher;
use crate::domain::feed::{FeedRegistry, SnapshotNormalizer};
use crate::domain::price::PriceSource;
use crate::infrastructure::hermes::{HermesClient, SnapshotSource};
use crate::infrastructure::retry::RetryPolicy;
use crate::shared::config::{AppConfig, ServiceMode};
use crate::shared::errors::{AppError, FeedError};
use crate::shared::types::{BatchFailure, FeedId, FeedSymbol, PriceBatch};

/// Requested symbols split into resolvable ones and the rest
#[derive(Debug, Default)]
struct Resolved {
    ids: Vec<FeedId>,
    known: HashSet<FeedSymbol>,
    unknown: Vec<String>,
}

impl Resolved {
    /// Duplicates are resolved once; unparsable or unregistered input goes to `unknown`
    fn new(registry: &FeedRegistry, symbols: &[String]) -> Self {
        let mut resolved = Self::default();
        for raw in symbols {
            match FeedSymbol::parse(raw).and_then(|symbol| Ok((registry.resolve(symbol.as_str())?, symbol))) {
                Ok((feed_id, symbol)) => {
                    if resolved.known.insert(symbol) {
                        resolved.ids.push(feed_id);
                    }
                }
                Err(e) => {
                    debug!("Skipping {}: {}", raw, e);
                    if !resolved.unknown.contains(raw) {
                        resolved.unknown.push(raw.clone());
                    }
                }
            }
        }
        resolved
    }
}

/// Batched requests with the configured retry policy
pub struct FullPriceService {
    normalizer: SnapshotNormalizer,
    fetcher: SnapshotFetcher,
}

impl FullPriceService {
    pub fn new(registry: Arc<FeedRegistry>, fetcher: SnapshotFetcher) -> Self {
        Self {
            normalizer: SnapshotNormalizer::new(registry),
            fetcher,
        }
    }
}

#[async_trait]
impl PriceSource for FullPriceService {
    fn kind(&self) -> &'static str {
        "full"
    }

    fn registry(&self) -> &FeedRegistry {
        self.normalizer.registry()
    }

    async fn latest_prices(&self, symbols: &[String]) -> Result<PriceBatch, FeedError> {
        let resolved = Resolved::new(self.registry(), symbols);
        let mut batch = PriceBatch::empty();
        batch.unknown = resolved.unknown;
        if resolved.ids.is_empty() {
            return Ok(batch);
        }

        let outcome = self.fetcher.fetch(&resolved.ids).await?;
        batch.quotes = self.normalizer.normalize(&outcome.quotes, &resolved.known);
        batch.failures = outcome.failures;
        batch.fetched_at = Utc::now();
        Ok(batch)
    }
}

/// One request per call: no batching, no retries
pub struct SimplePriceService {
    normalizer: SnapshotNormalizer,
    source: Arc<dyn SnapshotSource>,
}

impl SimplePriceService {
    pub fn new(registry: Arc<FeedRegistry>, source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            normalizer: SnapshotNormalizer::new(registry),
            source,
        }
    }
}

#[async_trait]
impl PriceSource for SimplePriceService {
    fn kind(&self) -> &'static str {
        "simple"
    }

    fn registry(&self) -> &FeedRegistry {
        self.normalizer.registry()
    }

    async fn latest_prices(&self, symbols: &[String]) -> Result<PriceBatch, FeedError> {
        let resolved = Resolved::new(self.registry(), symbols);
        let mut batch = PriceBatch::empty();
        batch.unknown = resolved.unknown;
        if resolved.ids.is_empty() {
            return Ok(batch);
        }

        let raw = self.source.latest_price_feeds(&resolved.ids).await?;
        batch.quotes = self.normalizer.normalize(&raw, &resolved.known);
        batch.fetched_at = Utc::now();
        Ok(batch)
    }
}

/// Built-in feeds plus the `[feeds]` table from the config
pub fn build_registry(config: &AppConfig) -> Result<FeedRegistry, AppError> {
    Ok(FeedRegistry::builtin().with_overrides(config.feed_overrides()?)?)
}

/// Pick the price source implementation named by `service.mode`
pub fn build_price_source(config: &AppConfig) -> Result<Arc<dyn PriceSource>, AppError> {
    let registry = Arc::new(build_registry(config)?);
    let client: Arc<dyn SnapshotSource> = Arc::new(HermesClient::from_config(&config.hermes)?);
    info!(
        "Using {:?} price service against {} ({} feeds)",
        config.service.mode,
        config.hermes.base_url,
        registry.len()
    );
    Ok(with_source(config, registry, client))
}

/// Same as `build_price_source` with an explicit upstream
pub fn with_source(
    config: &AppConfig,
    registry: Arc<FeedRegistry>,
    source: Arc<dyn SnapshotSource>,
) -> Arc<dyn PriceSource> {
    match config.service.mode {
        ServiceMode::Full => {
            let fetcher = SnapshotFetcher::new(
                source,
                RetryPolicy::from_config(&config.request),
                config.request.batch_size,
            );
            Arc::new(FullPriceService::new(registry, fetcher))
        }
        ServiceMode::Simple => Arc::new(SimplePriceService::new(registry, source)),
    }
}

/// Failed batches as `feed ids -> error` lines for logs and console output
pub fn describe_failures(failures: &[BatchFailure]) -> Vec<String> {
    failures
        .iter()
        .map(|failure| format!("{} feeds: {}", failure.feed_ids.len(), failure.error))
        .collect()
}
