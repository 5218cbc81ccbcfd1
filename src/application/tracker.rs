//! Price tracker: alerts + history on top of the poll loop

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::alert::{AlertBook, AlertDirection, AlertRule};
use crate::domain::price::{BatchConsumer, PriceHistory, SeriesSummary};
use crate::report::ExportDocument;
use crate::shared::errors::{AppError, FeedError};
use crate::shared::types::{FeedSymbol, NormalizedQuote, PriceBatch};
use crate::shared::utils::{export_file_name, format_price};

#[derive(Default)]
struct TrackerState {
    alerts: AlertBook,
    history: PriceHistory,
    fired: Vec<AlertRule>,
}

/// Records every batch and evaluates alert rules against it.
///
/// Shared between the poll loop (writes) and foreground callers (reads),
/// so all state sits behind one lock.
pub struct PriceTracker {
    state: Mutex<TrackerState>,
    window: Duration,
}

impl PriceTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn add_alert(&self, symbol: FeedSymbol, threshold: f64, direction: AlertDirection) -> AlertRule {
        let rule = self.state.lock().alerts.add(symbol, threshold, direction);
        info!("🔔 Alert added: {}", rule);
        rule
    }

    pub fn add_rule(&self, rule: AlertRule) -> AlertRule {
        let rule = self.state.lock().alerts.insert(rule);
        info!("🔔 Alert added: {}", rule);
        rule
    }

    pub fn remove_alert(&self, id: Uuid) -> Option<AlertRule> {
        self.state.lock().alerts.remove(id)
    }

    pub fn alerts(&self) -> Vec<AlertRule> {
        self.state.lock().alerts.rules().to_vec()
    }

    /// Rules that have fired so far, in firing order
    pub fn fired(&self) -> Vec<AlertRule> {
        self.state.lock().fired.clone()
    }

    /// Record one quote and evaluate alerts for it. Returns the rules that fired.
    pub fn record(&self, quote: &NormalizedQuote) -> Vec<AlertRule> {
        let mut state = self.state.lock();
        let symbol = quote.symbol.clone();
        state.history.record(&symbol, quote.clone());

        let fired = state.alerts.evaluate(&symbol, quote.price_f64());
        for rule in &fired {
            warn!(
                "🚨 ALERT {} is {} {} (now {})",
                rule.symbol,
                rule.direction,
                format_price(rule.threshold),
                format_price(quote.price_f64())
            );
        }
        state.fired.extend(fired.iter().cloned());
        fired
    }

    pub fn summarize(&self, symbol: &FeedSymbol) -> SeriesSummary {
        self.summarize_window(symbol, self.window)
    }

    pub fn summarize_window(&self, symbol: &FeedSymbol, window: Duration) -> SeriesSummary {
        self.state.lock().history.summarize(symbol, window)
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Drop points published before the analytics window
    pub fn prune(&self) -> usize {
        let cutoff = Utc::now() - self.window;
        let removed = self.state.lock().history.prune_before(cutoff);
        if removed > 0 {
            debug!("Pruned {} points outside the {}s window", removed, self.window.num_seconds());
        }
        removed
    }

    pub fn export(&self) -> ExportDocument {
        let state = self.state.lock();
        ExportDocument::new(&state.history, state.alerts.rules())
    }

    pub fn export_json(&self) -> Result<String, AppError> {
        Ok(self.export().to_json()?)
    }

    /// Write the export document; `None` picks a timestamped file name
    pub fn export_to_file(&self, path: Option<&Path>) -> Result<PathBuf, AppError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(export_file_name(Utc::now())));
        self.export().write_to(&path)?;
        info!("💾 Exported price data to {}", path.display());
        Ok(path)
    }
}

impl BatchConsumer for PriceTracker {
    fn on_batch(&self, batch: &PriceBatch) {
        for quote in batch.quotes.values() {
            self.record(quote);
        }
        // Long-running trackers keep only what the window can still see
        self.prune();
    }

    fn on_error(&self, error: &FeedError) {
        warn!("Tracker skipped a cycle: {}", error);
    }
}
