//! In-memory per-symbol price series

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::{PriceAnalyzer, SeriesSummary};
use crate::shared::types::{FeedSymbol, NormalizedQuote};

/// Per-symbol quote series in arrival order.
///
/// Points are never reordered, even when the upstream delivers publish times
/// out of order. Series grow until pruned.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    series: BTreeMap<FeedSymbol, Vec<NormalizedQuote>>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, symbol: &FeedSymbol, quote: NormalizedQuote) {
        self.series.entry(symbol.clone()).or_default().push(quote);
    }

    pub fn series(&self, symbol: &FeedSymbol) -> Option<&[NormalizedQuote]> {
        self.series.get(symbol).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeedSymbol, &[NormalizedQuote])> {
        self.series.iter().map(|(symbol, points)| (symbol, points.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Drop points published before `cutoff`; returns how many were removed
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for points in self.series.values_mut() {
            let before = points.len();
            points.retain(|quote| quote.timestamp >= cutoff);
            removed += before - points.len();
        }
        removed
    }

    /// Statistics over points published within `window` of now
    pub fn summarize(&self, symbol: &FeedSymbol, window: Duration) -> SeriesSummary {
        self.summarize_at(symbol, window, Utc::now())
    }

    pub fn summarize_at(&self, symbol: &FeedSymbol, window: Duration, now: DateTime<Utc>) -> SeriesSummary {
        let Some(points) = self.series.get(symbol) else {
            return SeriesSummary::NoHistory { symbol: symbol.clone() };
        };

        let cutoff = now - window;
        let recent: Vec<&NormalizedQuote> = points.iter().filter(|quote| quote.timestamp >= cutoff).collect();

        match PriceAnalyzer::analyze(symbol, window, &recent) {
            Some(stats) => SeriesSummary::Stats(stats),
            None => SeriesSummary::NoRecentData {
                symbol: symbol.clone(),
                window_secs: window.num_seconds(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feed::build_quote;
    use crate::shared::types::FeedId;
    use chrono::TimeZone;

    const AA: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn btc() -> FeedSymbol {
        FeedSymbol::parse("BTC/USD").unwrap()
    }

    fn quote(price: i128, publish_time: i64) -> NormalizedQuote {
        build_quote(btc(), FeedId::parse(AA).unwrap(), price, 1, 0, publish_time).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_unknown_symbol_has_no_history() {
        let history = PriceHistory::new();
        assert_eq!(
            history.summarize_at(&btc(), Duration::hours(1), now()),
            SeriesSummary::NoHistory { symbol: btc() }
        );
    }

    #[test]
    fn test_stale_points_report_no_recent_data() {
        let mut history = PriceHistory::new();
        history.record(&btc(), quote(100, 1_700_000_000 - 7_200));

        let summary = history.summarize_at(&btc(), Duration::hours(1), now());
        assert_eq!(
            summary,
            SeriesSummary::NoRecentData { symbol: btc(), window_secs: 3_600 }
        );
    }

    #[test]
    fn test_single_point_has_zero_deviation_and_change() {
        let mut history = PriceHistory::new();
        history.record(&btc(), quote(100, 1_700_000_000 - 10));

        let summary = history.summarize_at(&btc(), Duration::hours(1), now());
        let stats = summary.stats().unwrap();
        assert_eq!(stats.data_points, 1);
        assert_eq!(stats.volatility, 0.0);
        assert_eq!(stats.price_change, 0.0);
        assert_eq!(stats.price_change_percent, 0.0);
    }

    #[test]
    fn test_zero_first_price_reports_zero_percent() {
        let mut history = PriceHistory::new();
        history.record(&btc(), quote(0, 1_700_000_000 - 20));
        history.record(&btc(), quote(50, 1_700_000_000 - 10));

        let summary = history.summarize_at(&btc(), Duration::hours(1), now());
        let stats = summary.stats().unwrap();
        assert_eq!(stats.price_change, 50.0);
        assert_eq!(stats.price_change_percent, 0.0);
    }

    #[test]
    fn test_window_statistics() {
        let mut history = PriceHistory::new();
        // Outside the window
        history.record(&btc(), quote(1, 1_700_000_000 - 10_000));
        for (i, price) in [100, 110, 90, 120].into_iter().enumerate() {
            history.record(&btc(), quote(price, 1_700_000_000 - 100 + i as i64));
        }

        let summary = history.summarize_at(&btc(), Duration::hours(1), now());
        let stats = summary.stats().unwrap();
        assert_eq!(stats.data_points, 4);
        assert_eq!(stats.first_price, 100.0);
        assert_eq!(stats.current_price, 120.0);
        assert_eq!(stats.highest_price, 120.0);
        assert_eq!(stats.lowest_price, 90.0);
        assert_eq!(stats.average_price, 105.0);
        assert_eq!(stats.median_price, 105.0);
        assert_eq!(stats.price_change, 20.0);
        assert_eq!(stats.price_change_percent, 20.0);
        assert!((stats.volatility - 12.909944).abs() < 1e-5);
    }

    #[test]
    fn test_arrival_order_preserved() {
        let mut history = PriceHistory::new();
        history.record(&btc(), quote(2, 1_700_000_000 - 5));
        history.record(&btc(), quote(1, 1_700_000_000 - 50));

        let points = history.series(&btc()).unwrap();
        assert_eq!(points[0].publish_time, 1_700_000_000 - 5);

        let stats = history.summarize_at(&btc(), Duration::hours(1), now());
        assert_eq!(stats.stats().unwrap().current_price, 1.0);
    }

    #[test]
    fn test_prune_before() {
        let mut history = PriceHistory::new();
        history.record(&btc(), quote(1, 100));
        history.record(&btc(), quote(2, 200));

        let removed = history.prune_before(Utc.timestamp_opt(150, 0).unwrap());
        assert_eq!(removed, 1);
        assert_eq!(history.len(), 1);
    }
}
