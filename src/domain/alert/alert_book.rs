//! Alert rule collection

use uuid::Uuid;

use super::{evaluate, AlertDirection, AlertRule};
use crate::shared::types::FeedSymbol;

/// Owned set of alert rules
#[derive(Debug, Clone, Default)]
pub struct AlertBook {
    rules: Vec<AlertRule>,
}

impl AlertBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: FeedSymbol, threshold: f64, direction: AlertDirection) -> AlertRule {
        self.insert(AlertRule::new(symbol, threshold, direction))
    }

    pub fn insert(&mut self, rule: AlertRule) -> AlertRule {
        self.rules.push(rule.clone());
        rule
    }

    /// Remove a rule by id; returns it when present
    pub fn remove(&mut self, id: Uuid) -> Option<AlertRule> {
        let index = self.rules.iter().position(|rule| rule.id == id)?;
        Some(self.rules.remove(index))
    }

    pub fn evaluate(&mut self, symbol: &FeedSymbol, price: f64) -> Vec<AlertRule> {
        evaluate(&mut self.rules, symbol, price)
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn pending(&self) -> impl Iterator<Item = &AlertRule> {
        self.rules.iter().filter(|rule| !rule.triggered)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
