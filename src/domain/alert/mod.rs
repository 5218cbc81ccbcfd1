//! Alert domain - one-shot price threshold rules

mod alert_book;

pub use alert_book::AlertBook;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::errors::FeedError;
use crate::shared::types::FeedSymbol;

/// Which side of the threshold fires the rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    Above,
    Below,
}

impl fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertDirection::Above => f.write_str("above"),
            AlertDirection::Below => f.write_str("below"),
        }
    }
}

/// Price threshold rule.
///
/// Rules are one-shot: once `triggered` is set the rule stays inert, even if
/// the price moves back across the threshold. There is no re-arm; remove the
/// rule and add a new one instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: Uuid,
    pub symbol: FeedSymbol,
    #[serde(rename = "target_price")]
    pub threshold: f64,
    #[serde(rename = "condition")]
    pub direction: AlertDirection,
    pub created_at: DateTime<Utc>,
    pub triggered: bool,
}

impl AlertRule {
    pub fn new(symbol: FeedSymbol, threshold: f64, direction: AlertDirection) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            threshold,
            direction,
            created_at: Utc::now(),
            triggered: false,
        }
    }

    /// Check the rule against a price, marking it triggered when it fires
    pub fn check_trigger(&mut self, price: f64) -> bool {
        if self.triggered {
            return false;
        }
        let crossed = match self.direction {
            AlertDirection::Above => price >= self.threshold,
            AlertDirection::Below => price <= self.threshold,
        };
        if crossed {
            self.triggered = true;
        }
        crossed
    }
}

impl fmt::Display for AlertRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:.4}", self.symbol, self.direction, self.threshold)
    }
}

/// `BTC/USD>45000` or `ETH-USD<2000`
impl FromStr for AlertRule {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (symbol, threshold, direction) = if let Some((symbol, price)) = s.split_once('>') {
            (symbol, price, AlertDirection::Above)
        } else if let Some((symbol, price)) = s.split_once('<') {
            (symbol, price, AlertDirection::Below)
        } else {
            return Err(FeedError::InvalidSymbol(s.to_string()));
        };

        let symbol = FeedSymbol::parse(symbol)?;
        let threshold: f64 = threshold
            .trim()
            .parse()
            .map_err(|_| FeedError::InvalidSymbol(s.to_string()))?;
        Ok(AlertRule::new(symbol, threshold, direction))
    }
}

/// Evaluate `price` for `symbol` against every rule, returning the rules that fired now
pub fn evaluate(rules: &mut [AlertRule], symbol: &FeedSymbol, price: f64) -> Vec<AlertRule> {
    rules
        .iter_mut()
        .filter(|rule| &rule.symbol == symbol)
        .filter_map(|rule| rule.check_trigger(price).then(|| rule.clone()))
        .collect()
}
