//! Common types used across the application

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::shared::errors::{FeedError, FetchError};

/// Human-readable feed symbol in `BASE/QUOTE` form, e.g. `BTC/USD`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedSymbol(String);

impl FeedSymbol {
    /// Parse user input. `btc-usd`, `BTC-USD` and ` BTC/USD ` all become `BTC/USD`.
    pub fn parse(input: &str) -> Result<Self, FeedError> {
        let normalized = input.trim().replace('-', "/").to_uppercase();
        let mut parts = normalized.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
                Ok(Self(normalized))
            }
            _ => Err(FeedError::InvalidSymbol(input.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    pub fn quote(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for FeedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FeedSymbol {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FeedSymbol {
    type Error = FeedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FeedSymbol> for String {
    fn from(symbol: FeedSymbol) -> Self {
        symbol.0
    }
}

impl Borrow<str> for FeedSymbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// 32-byte upstream feed identifier.
///
/// Displayed with a `0x` prefix; parsing accepts the prefix or not, in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedId([u8; 32]);

impl FeedId {
    pub fn parse(input: &str) -> Result<Self, FeedError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(digits).map_err(|_| FeedError::InvalidFeedId(input.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| FeedError::InvalidFeedId(input.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex without prefix, the form the upstream API echoes back
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl FromStr for FeedId {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FeedId {
    type Error = FeedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FeedId> for String {
    fn from(id: FeedId) -> Self {
        id.to_string()
    }
}

/// Fixed-point price component as published upstream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPrice {
    #[serde(default, deserialize_with = "string_or_integer")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "string_or_integer")]
    pub conf: Option<String>,
    #[serde(default)]
    pub expo: Option<i32>,
    #[serde(default)]
    pub publish_time: Option<i64>,
}

/// One entry of an upstream snapshot, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    #[serde(rename = "id")]
    pub feed_id: String,
    #[serde(default)]
    pub price: Option<RawPrice>,
    #[serde(default)]
    pub ema_price: Option<RawPrice>,
}

impl RawQuote {
    pub fn new(feed_id: impl Into<String>, price: i64, conf: u64, expo: i32, publish_time: i64) -> Self {
        Self {
            feed_id: feed_id.into(),
            price: Some(RawPrice {
                price: Some(price.to_string()),
                conf: Some(conf.to_string()),
                expo: Some(expo),
                publish_time: Some(publish_time),
            }),
            ema_price: None,
        }
    }
}

/// Mantissas arrive as JSON strings from Hermes; plain integers are accepted too.
fn string_or_integer<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mantissa {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(Option::<Mantissa>::deserialize(deserializer)?.map(|m| match m {
        Mantissa::Text(s) => s,
        Mantissa::Signed(v) => v.to_string(),
        Mantissa::Unsigned(v) => v.to_string(),
    }))
}

/// Display-ready quote: mantissas scaled by the shared exponent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuote {
    pub symbol: FeedSymbol,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(rename = "confidence_interval", with = "rust_decimal::serde::float")]
    pub confidence: Decimal,
    pub timestamp: DateTime<Utc>,
    pub feed_id: FeedId,
    pub expo: i32,
    pub publish_time: i64,
}

impl NormalizedQuote {
    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or_default()
    }

    pub fn confidence_f64(&self) -> f64 {
        self.confidence.to_f64().unwrap_or_default()
    }
}

/// A batch of feed ids that could not be fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub feed_ids: Vec<FeedId>,
    #[serde(serialize_with = "display_string")]
    pub error: FetchError,
}

/// Result of one multi-symbol price query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBatch {
    pub quotes: BTreeMap<FeedSymbol, NormalizedQuote>,
    /// Requested symbols the registry could not resolve
    pub unknown: Vec<String>,
    pub failures: Vec<BatchFailure>,
    pub fetched_at: DateTime<Utc>,
}

impl PriceBatch {
    pub fn empty() -> Self {
        Self {
            quotes: BTreeMap::new(),
            unknown: Vec::new(),
            failures: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unknown.is_empty() && self.failures.is_empty()
    }
}

fn display_string<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
