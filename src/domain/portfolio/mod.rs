//! Portfolio domain - holdings valued against latest quotes

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::shared::types::{FeedSymbol, NormalizedQuote};

/// Value of one holding at valuation time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingValue {
    pub quantity: f64,
    /// `None` when no quote was available
    pub price: Option<f64>,
    pub value: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioValuation {
    pub total_value: f64,
    pub holdings: BTreeMap<FeedSymbol, HoldingValue>,
    pub timestamp: DateTime<Utc>,
}

/// Quantities held per symbol
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    holdings: BTreeMap<FeedSymbol, f64>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to a holding, creating it if needed. Returns the new quantity.
    pub fn add_holding(&mut self, symbol: FeedSymbol, quantity: f64) -> f64 {
        let held = self.holdings.entry(symbol).or_insert(0.0);
        *held += quantity;
        *held
    }

    /// Remove `quantity` of a holding, or all of it when `None`.
    ///
    /// Returns the remaining quantity, or `None` if the symbol was not held.
    /// A holding that reaches zero is dropped.
    pub fn remove_holding(&mut self, symbol: &FeedSymbol, quantity: Option<f64>) -> Option<f64> {
        let held = self.holdings.get_mut(symbol)?;
        let remaining = match quantity {
            Some(quantity) => (*held - quantity).max(0.0),
            None => 0.0,
        };

        if remaining == 0.0 {
            self.holdings.remove(symbol);
        } else {
            *held = remaining;
        }
        Some(remaining)
    }

    pub fn symbols(&self) -> Vec<FeedSymbol> {
        self.holdings.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Value every holding against `prices`.
    ///
    /// Holdings without a quote are worth zero. Percentages are zero when the
    /// total is zero.
    pub fn valuation(&self, prices: &BTreeMap<FeedSymbol, NormalizedQuote>) -> PortfolioValuation {
        let mut holdings: BTreeMap<FeedSymbol, HoldingValue> = self
            .holdings
            .iter()
            .map(|(symbol, &quantity)| {
                let price = prices.get(symbol).map(NormalizedQuote::price_f64);
                let value = price.map(|p| p * quantity).unwrap_or(0.0);
                (
                    symbol.clone(),
                    HoldingValue {
                        quantity,
                        price,
                        value,
                        percentage: 0.0,
                    },
                )
            })
            .collect();

        let total_value: f64 = holdings.values().map(|h| h.value).sum();
        if total_value > 0.0 {
            for holding in holdings.values_mut() {
                holding.percentage = holding.value / total_value * 100.0;
            }
        }

        PortfolioValuation {
            total_value,
            holdings,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feed::build_quote;
    use crate::shared::types::FeedId;

    const AA: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn sym(s: &str) -> FeedSymbol {
        FeedSymbol::parse(s).unwrap()
    }

    fn prices(entries: &[(&str, i128)]) -> BTreeMap<FeedSymbol, NormalizedQuote> {
        entries
            .iter()
            .map(|(s, p)| (sym(s), build_quote(sym(s), FeedId::parse(AA).unwrap(), *p, 0, 0, 1_700_000_000).unwrap()))
            .collect()
    }

    #[test]
    fn test_add_accumulates() {
        let mut portfolio = Portfolio::new();
        portfolio.add_holding(sym("BTC/USD"), 0.5);
        assert_eq!(portfolio.add_holding(sym("btc-usd"), 0.25), 0.75);
        assert_eq!(portfolio.len(), 1);
    }

    #[test]
    fn test_remove_partial_full_and_missing() {
        let mut portfolio = Portfolio::new();
        portfolio.add_holding(sym("ETH/USD"), 10.0);

        assert_eq!(portfolio.remove_holding(&sym("ETH/USD"), Some(4.0)), Some(6.0));
        assert_eq!(portfolio.remove_holding(&sym("ETH/USD"), Some(100.0)), Some(0.0));
        assert!(portfolio.is_empty());
        assert_eq!(portfolio.remove_holding(&sym("ETH/USD"), None), None);
    }

    #[test]
    fn test_valuation_percentages() {
        let mut portfolio = Portfolio::new();
        portfolio.add_holding(sym("BTC/USD"), 1.0);
        portfolio.add_holding(sym("ETH/USD"), 10.0);
        portfolio.add_holding(sym("SOL/USD"), 5.0);

        let valuation = portfolio.valuation(&prices(&[("BTC/USD", 30_000), ("ETH/USD", 1_000)]));
        assert_eq!(valuation.total_value, 40_000.0);
        assert_eq!(valuation.holdings[&sym("BTC/USD")].percentage, 75.0);
        assert_eq!(valuation.holdings[&sym("ETH/USD")].value, 10_000.0);

        let sol = &valuation.holdings[&sym("SOL/USD")];
        assert_eq!(sol.price, None);
        assert_eq!(sol.value, 0.0);
        assert_eq!(sol.percentage, 0.0);
    }

    #[test]
    fn test_valuation_without_prices() {
        let mut portfolio = Portfolio::new();
        portfolio.add_holding(sym("BTC/USD"), 1.0);
        let valuation = portfolio.valuation(&BTreeMap::new());
        assert_eq!(valuation.total_value, 0.0);
        assert_eq!(valuation.holdings[&sym("BTC/USD")].percentage, 0.0);
    }
}
