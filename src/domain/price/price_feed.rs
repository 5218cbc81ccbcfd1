//! Price feed interfaces

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::feed::FeedRegistry;
use crate::shared::errors::FeedError;
use crate::shared::types::{FeedSymbol, NormalizedQuote, PriceBatch};

/// Resolve, fetch and normalize prices.
///
/// Implementations are picked once at construction time (see
/// `application::services::build_price_source`).
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short label of the implementation, e.g. `full` or `simple`
    fn kind(&self) -> &'static str;

    fn registry(&self) -> &FeedRegistry;

    /// Latest quotes for `symbols`.
    ///
    /// Unknown symbols are listed in the batch, not raised. Fails only when
    /// every upstream request failed.
    async fn latest_prices(&self, symbols: &[String]) -> Result<PriceBatch, FeedError>;

    async fn latest_price(&self, symbol: &str) -> Result<NormalizedQuote, FeedError> {
        let parsed = FeedSymbol::parse(symbol)?;
        self.registry().resolve(parsed.as_str())?;

        let mut batch = self.latest_prices(&[parsed.to_string()]).await?;
        if let Some(quote) = batch.quotes.remove(&parsed) {
            return Ok(quote);
        }
        match batch.failures.pop() {
            Some(failure) => Err(FeedError::Fetch(failure.error)),
            None => Err(FeedError::NoData(parsed.to_string())),
        }
    }
}

/// Receives every normalized batch produced by the poll loop
pub trait BatchConsumer: Send + Sync {
    fn on_batch(&self, batch: &PriceBatch);

    /// Called when a whole poll cycle failed
    fn on_error(&self, _error: &FeedError) {}
}

/// Forwards each batch to several consumers in order
#[derive(Clone, Default)]
pub struct FanOut {
    consumers: Vec<Arc<dyn BatchConsumer>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, consumer: Arc<dyn BatchConsumer>) -> Self {
        self.consumers.push(consumer);
        self
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

impl BatchConsumer for FanOut {
    fn on_batch(&self, batch: &PriceBatch) {
        for consumer in &self.consumers {
            consumer.on_batch(batch);
        }
    }

    fn on_error(&self, error: &FeedError) {
        for consumer in &self.consumers {
            consumer.on_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Counter {
        batches: Mutex<usize>,
        errors: Mutex<usize>,
    }

    impl BatchConsumer for Counter {
        fn on_batch(&self, _batch: &PriceBatch) {
            *self.batches.lock() += 1;
        }

        fn on_error(&self, _error: &FeedError) {
            *self.errors.lock() += 1;
        }
    }

    #[test]
    fn test_fan_out_reaches_every_consumer() {
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        let fan_out = FanOut::new().with(a.clone()).with(b.clone());

        fan_out.on_batch(&PriceBatch::empty());
        fan_out.on_error(&FeedError::NoData("BTC/USD".into()));

        assert_eq!(fan_out.len(), 2);
        assert_eq!(*a.batches.lock(), 1);
        assert_eq!(*b.batches.lock(), 1);
        assert_eq!(*b.errors.lock(), 1);
    }
}
