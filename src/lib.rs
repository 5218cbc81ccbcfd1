//! Pythfeed - Pyth Network price feeds over the Hermes API
//! Layered as shared / domain / infrastructure / application

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod math;
pub mod report;
pub mod shared;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use application::{PriceMonitor, PriceTracker};
pub use domain::feed::{FeedRegistry, SnapshotNormalizer};
pub use domain::price::PriceSource;
pub use shared::types::{FeedId, FeedSymbol, NormalizedQuote, PriceBatch};
