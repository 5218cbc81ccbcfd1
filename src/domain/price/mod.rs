//! Price domain - price sources, history and analysis

mod price_feed;
mod price_history;
mod price_analyzer;

pub use price_feed::{BatchConsumer, FanOut, PriceSource};
pub use price_history::PriceHistory;
pub use price_analyzer::PriceAnalyzer;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::shared::types::FeedSymbol;

/// Summary statistics over a trailing window of one price series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStats {
    pub symbol: FeedSymbol,
    pub window_secs: i64,
    pub data_points: usize,
    pub first_price: f64,
    pub current_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub average_price: f64,
    pub median_price: f64,
    /// Sample standard deviation; zero with fewer than two points
    pub volatility: f64,
    pub price_change: f64,
    /// Zero when the first price in the window is zero
    pub price_change_percent: f64,
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
}

/// Outcome of an analytics query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeriesSummary {
    /// Nothing was ever recorded for the symbol
    NoHistory { symbol: FeedSymbol },
    /// History exists but no point falls inside the window
    NoRecentData { symbol: FeedSymbol, window_secs: i64 },
    Stats(PriceStats),
}

impl SeriesSummary {
    pub fn stats(&self) -> Option<&PriceStats> {
        match self {
            SeriesSummary::Stats(stats) => Some(stats),
            _ => None,
        }
    }
}
