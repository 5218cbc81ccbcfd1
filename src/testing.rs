//! Test fixtures: scripted upstream source and small registries

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;

use crate::domain::feed::FeedRegistry;
use crate::infrastructure::hermes::SnapshotSource;
use crate::shared::errors::FetchError;
use crate::shared::types::{FeedId, FeedSymbol, RawQuote};

pub const AA: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const BB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

/// `BTC/USD` -> AA, `ETH/USD` -> BB
pub fn btc_eth_registry() -> FeedRegistry {
    FeedRegistry::from_pairs(&[("BTC/USD", AA), ("ETH/USD", BB)]).unwrap()
}

/// `T0/USD` .. `T{n-1}/USD`, each with a distinct feed id
pub fn numbered_registry(n: u8) -> FeedRegistry {
    FeedRegistry::new((0..n).map(|i| {
        let mut bytes = [0u8; 32];
        bytes[0] = i;
        bytes[31] = 0xff;
        (FeedSymbol::parse(&format!("T{}/USD", i)).unwrap(), FeedId::from_bytes(bytes))
    }))
    .unwrap()
}

/// In-memory upstream that answers from a fixed quote table.
///
/// Every request is recorded. Failures can be scripted for the next N calls
/// or for any request that contains a given feed id.
#[derive(Default)]
pub struct FakeSource {
    quotes: Mutex<HashMap<FeedId, RawQuote>>,
    requests: Mutex<Vec<Vec<FeedId>>>,
    vaa_requests: AtomicUsize,
    fail_next: Mutex<Vec<FetchError>>,
    fail_for: Mutex<HashMap<FeedId, FetchError>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with a quote for every feed in `registry`, price `100 + index`
    pub fn serving(registry: &FeedRegistry) -> Self {
        let source = Self::new();
        for (i, symbol) in registry.symbols().iter().enumerate() {
            if let Some(id) = registry.feed_id(symbol) {
                source.set_quote(RawQuote::new(id.to_hex(), 100 + i as i64, 1, 0, 1_700_000_000));
            }
        }
        source
    }

    pub fn set_quote(&self, quote: RawQuote) {
        let id = FeedId::parse(&quote.feed_id).unwrap();
        self.quotes.lock().insert(id, quote);
    }

    /// The next `count` requests fail with `error`
    pub fn fail_next(&self, count: usize, error: FetchError) {
        let mut queue = self.fail_next.lock();
        queue.extend(std::iter::repeat(error).take(count));
    }

    /// Any request that includes `id` fails with `error`
    pub fn fail_for(&self, id: FeedId, error: FetchError) {
        self.fail_for.lock().insert(id, error);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn request_sizes(&self) -> Vec<usize> {
        self.requests.lock().iter().map(Vec::len).collect()
    }

    pub fn vaa_request_count(&self) -> usize {
        self.vaa_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    async fn latest_price_feeds(&self, ids: &[FeedId]) -> Result<Vec<RawQuote>, FetchError> {
        self.requests.lock().push(ids.to_vec());

        {
            let mut queue = self.fail_next.lock();
            if !queue.is_empty() {
                return Err(queue.remove(0));
            }
        }
        if let Some(err) = ids.iter().find_map(|id| self.fail_for.lock().get(id).cloned()) {
            return Err(err);
        }

        let quotes = self.quotes.lock();
        Ok(ids.iter().filter_map(|id| quotes.get(id).cloned()).collect())
    }

    async fn latest_vaas(&self, ids: &[FeedId]) -> Result<Vec<String>, FetchError> {
        self.vaa_requests.fetch_add(1, Ordering::SeqCst);
        Ok(ids.iter().map(|id| STANDARD.encode(id.as_bytes())).collect())
    }
}
