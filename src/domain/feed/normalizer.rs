//! Snapshot normalization: fixed-point upstream entries -> decimal quotes

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::FeedRegistry;
use crate::math::scale_mantissa;
use crate::shared::errors::FeedError;
use crate::shared::types::{FeedId, FeedSymbol, NormalizedQuote, RawQuote};

/// Build a quote from integer parts, scaling price and confidence by the same exponent
pub fn build_quote(
    symbol: FeedSymbol,
    feed_id: FeedId,
    price: i128,
    conf: i128,
    expo: i32,
    publish_time: i64,
) -> Result<NormalizedQuote, FeedError> {
    let malformed = |reason: &str| FeedError::MalformedSnapshot {
        feed_id: feed_id.to_string(),
        reason: reason.to_string(),
    };

    if conf < 0 {
        return Err(malformed("negative confidence"));
    }
    let price = scale_mantissa(price, expo).ok_or_else(|| malformed("price out of range"))?;
    let confidence = scale_mantissa(conf, expo).ok_or_else(|| malformed("confidence out of range"))?;
    let timestamp = publish_timestamp(publish_time).ok_or_else(|| malformed("invalid publish_time"))?;

    Ok(NormalizedQuote {
        symbol,
        price,
        confidence,
        timestamp,
        feed_id,
        expo,
        publish_time,
    })
}

/// Publish time is UTC epoch seconds
pub fn publish_timestamp(publish_time: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(publish_time, 0)
}

/// Turns raw snapshot entries into normalized quotes keyed by symbol
#[derive(Debug, Clone)]
pub struct SnapshotNormalizer {
    registry: Arc<FeedRegistry>,
}

impl SnapshotNormalizer {
    pub fn new(registry: Arc<FeedRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    /// Normalize a snapshot, keeping only `known` symbols.
    ///
    /// Entries with an unknown feed id, a missing price object or unparsable
    /// fields are dropped. When a symbol appears twice, the newest publish time wins.
    pub fn normalize(
        &self,
        raw: &[RawQuote],
        known: &HashSet<FeedSymbol>,
    ) -> BTreeMap<FeedSymbol, NormalizedQuote> {
        let mut quotes: BTreeMap<FeedSymbol, NormalizedQuote> = BTreeMap::new();

        for entry in raw {
            let quote = match self.normalize_entry(entry) {
                Ok(quote) => quote,
                Err(e) => {
                    debug!("Dropping snapshot entry {}: {}", entry.feed_id, e);
                    continue;
                }
            };
            if !known.contains(&quote.symbol) {
                debug!("Dropping unrequested feed {} ({})", quote.symbol, entry.feed_id);
                continue;
            }
            match quotes.get(&quote.symbol) {
                Some(existing) if existing.publish_time >= quote.publish_time => {}
                _ => {
                    quotes.insert(quote.symbol.clone(), quote);
                }
            }
        }

        quotes
    }

    /// Normalize one entry against the registry
    pub fn normalize_entry(&self, entry: &RawQuote) -> Result<NormalizedQuote, FeedError> {
        let malformed = |reason: &str| FeedError::MalformedSnapshot {
            feed_id: entry.feed_id.clone(),
            reason: reason.to_string(),
        };

        let feed_id = FeedId::parse(&entry.feed_id)?;
        let symbol = self
            .registry
            .reverse_id(&feed_id)
            .cloned()
            .ok_or_else(|| FeedError::UnknownSymbol(entry.feed_id.clone()))?;

        let raw_price = entry.price.as_ref().ok_or_else(|| malformed("missing price object"))?;
        let (Some(price), Some(conf), Some(expo), Some(publish_time)) = (
            raw_price.price.as_deref(),
            raw_price.conf.as_deref(),
            raw_price.expo,
            raw_price.publish_time,
        ) else {
            return Err(malformed("incomplete price object"));
        };

        let price: i128 = price.trim().parse().map_err(|_| malformed("unparsable price"))?;
        let conf: i128 = conf.trim().parse().map_err(|_| malformed("unparsable confidence"))?;

        build_quote(symbol, feed_id, price, conf, expo, publish_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::RawPrice;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const AA: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const BB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const CC: &str = "0xcccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc";

    fn normalizer() -> SnapshotNormalizer {
        let registry = FeedRegistry::from_pairs(&[("BTC/USD", AA), ("ETH/USD", BB)]).unwrap();
        SnapshotNormalizer::new(Arc::new(registry))
    }

    fn known(symbols: &[&str]) -> HashSet<FeedSymbol> {
        symbols.iter().map(|s| FeedSymbol::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_end_to_end_btc_snapshot() {
        let raw: Vec<RawQuote> = serde_json::from_str(
            r#"[{"id": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                 "price": {"price": "5000000000000", "conf": "10000000", "expo": -8, "publish_time": 1700000000}}]"#,
        )
        .unwrap();

        let quotes = normalizer().normalize(&raw, &known(&["BTC/USD", "ETH/USD"]));
        assert_eq!(quotes.len(), 1);

        let btc = &quotes["BTC/USD"];
        assert_eq!(btc.price_f64(), 50000.0);
        assert_eq!(btc.confidence, Decimal::from_str("0.1").unwrap());
        assert_eq!(btc.timestamp.to_rfc3339(), "2023-11-14T22:13:20+00:00");
        assert_eq!(btc.feed_id.to_string(), AA);
    }

    #[test]
    fn test_unrecognized_feed_is_omitted() {
        let raw = vec![
            RawQuote::new(&AA[2..], 100_000_000, 1_000, -8, 1_700_000_000),
            RawQuote::new(&CC[2..], 200_000_000, 1_000, -8, 1_700_000_000),
        ];
        let quotes = normalizer().normalize(&raw, &known(&["BTC/USD"]));
        assert_eq!(quotes.len(), 1);
        assert!(quotes.contains_key("BTC/USD"));
    }

    #[test]
    fn test_unrequested_known_feed_is_omitted() {
        let raw = vec![
            RawQuote::new(AA, 100_000_000, 1_000, -8, 1_700_000_000),
            RawQuote::new(BB, 200_000_000, 1_000, -8, 1_700_000_000),
        ];
        let quotes = normalizer().normalize(&raw, &known(&["ETH/USD"]));
        assert_eq!(quotes.keys().map(|s| s.as_str()).collect::<Vec<_>>(), vec!["ETH/USD"]);
    }

    #[test]
    fn test_missing_or_empty_price_is_dropped() {
        let mut missing = RawQuote::new(AA, 1, 1, -8, 1_700_000_000);
        missing.price = None;
        let mut empty = RawQuote::new(BB, 1, 1, -8, 1_700_000_000);
        empty.price = Some(RawPrice::default());

        let quotes = normalizer().normalize(&[missing, empty], &known(&["BTC/USD", "ETH/USD"]));
        assert!(quotes.is_empty());
    }

    #[test]
    fn test_garbage_mantissa_is_dropped() {
        let mut entry = RawQuote::new(AA, 1, 1, -8, 1_700_000_000);
        if let Some(price) = entry.price.as_mut() {
            price.price = Some("12abc".to_string());
        }
        let err = normalizer().normalize_entry(&entry).unwrap_err();
        assert!(matches!(err, FeedError::MalformedSnapshot { .. }));
    }

    #[test]
    fn test_price_and_confidence_share_exponent() {
        let entry = RawQuote::new(AA, 123_456_789, 4_321, -5, 1_700_000_000);
        let quote = normalizer().normalize_entry(&entry).unwrap();
        assert_eq!(quote.price, Decimal::from_str("1234.56789").unwrap());
        assert_eq!(quote.confidence, Decimal::from_str("0.04321").unwrap());
        assert_eq!(quote.expo, -5);
    }

    #[test]
    fn test_negative_confidence_rejected() {
        let err = build_quote(
            FeedSymbol::parse("BTC/USD").unwrap(),
            FeedId::parse(AA).unwrap(),
            100,
            -1,
            -2,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, FeedError::MalformedSnapshot { .. }));
    }

    #[test]
    fn test_duplicate_entries_keep_newest() {
        let raw = vec![
            RawQuote::new(AA, 200, 1, 0, 1_700_000_010),
            RawQuote::new(AA, 100, 1, 0, 1_700_000_000),
        ];
        let quotes = normalizer().normalize(&raw, &known(&["BTC/USD"]));
        assert_eq!(quotes["BTC/USD"].price, Decimal::from(200));
    }
}
