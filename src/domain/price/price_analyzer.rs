//! Price analysis and calculations

use chrono::Duration;

use super::PriceStats;
use crate::math::{mean, median, percentage_change, sample_std_dev};
use crate::shared::types::{FeedSymbol, NormalizedQuote};

/// Computes summary statistics over price points
pub struct PriceAnalyzer;

impl PriceAnalyzer {
    /// Statistics over `points` in arrival order. `None` for an empty slice.
    pub fn analyze(symbol: &FeedSymbol, window: Duration, points: &[&NormalizedQuote]) -> Option<PriceStats> {
        let first = points.first()?;
        let last = points.last()?;

        let prices: Vec<f64> = points.iter().map(|quote| quote.price_f64()).collect();
        let first_price = first.price_f64();
        let current_price = last.price_f64();

        Some(PriceStats {
            symbol: symbol.clone(),
            window_secs: window.num_seconds(),
            data_points: prices.len(),
            first_price,
            current_price,
            highest_price: prices.iter().copied().fold(f64::MIN, f64::max),
            lowest_price: prices.iter().copied().fold(f64::MAX, f64::min),
            average_price: mean(&prices),
            median_price: median(&prices),
            volatility: sample_std_dev(&prices),
            price_change: current_price - first_price,
            price_change_percent: percentage_change(first_price, current_price),
            first_timestamp: first.timestamp,
            last_timestamp: last.timestamp,
        })
    }
}
