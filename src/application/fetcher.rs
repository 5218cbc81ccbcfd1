//! Batched snapshot fetching with retries

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::infrastructure::hermes::SnapshotSource;
use crate::infrastructure::retry::RetryPolicy;
use crate::shared::errors::FetchError;
use crate::shared::types::{BatchFailure, FeedId, RawQuote};

/// Raw entries from every successful batch plus the batches that failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub quotes: Vec<RawQuote>,
    pub failures: Vec<BatchFailure>,
    pub batches: usize,
}

/// Splits feed ids into batches and fetches each with its own retry budget.
///
/// Batches are independent: one exhausting its retries does not cancel the
/// others.
#[derive(Clone)]
pub struct SnapshotFetcher {
    source: Arc<dyn SnapshotSource>,
    policy: RetryPolicy,
    batch_size: usize,
}

impl SnapshotFetcher {
    pub fn new(source: Arc<dyn SnapshotSource>, policy: RetryPolicy, batch_size: usize) -> Self {
        Self {
            source,
            policy,
            batch_size: batch_size.max(1),
        }
    }

    /// Fetch every id. Fails only when all batches failed; the error is the
    /// last batch failure.
    pub async fn fetch(&self, ids: &[FeedId]) -> Result<FetchOutcome, FetchError> {
        if ids.is_empty() {
            return Ok(FetchOutcome::default());
        }

        let batches: Vec<&[FeedId]> = ids.chunks(self.batch_size).collect();
        debug!("Fetching {} feeds in {} batches", ids.len(), batches.len());

        let results = join_all(batches.iter().enumerate().map(|(index, batch)| {
            let label = format!("batch {}/{}", index + 1, batches.len());
            async move {
                let result = self
                    .policy
                    .run(&label, || self.source.latest_price_feeds(batch))
                    .await;
                (*batch, result)
            }
        }))
        .await;

        let mut outcome = FetchOutcome {
            batches: batches.len(),
            ..FetchOutcome::default()
        };
        for (batch, result) in results {
            match result {
                Ok(mut quotes) => outcome.quotes.append(&mut quotes),
                Err(error) => {
                    warn!("Batch of {} feeds failed: {}", batch.len(), error);
                    outcome.failures.push(BatchFailure {
                        feed_ids: batch.to_vec(),
                        error,
                    });
                }
            }
        }

        if outcome.failures.len() == outcome.batches {
            if let Some(last) = outcome.failures.pop() {
                return Err(last.error);
            }
        }
        Ok(outcome)
    }
}
