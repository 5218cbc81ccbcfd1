//! Application layer - use cases and services

pub mod commands;
pub mod fetcher;
pub mod poller;
pub mod relay;
pub mod server;
pub mod services;
pub mod tracker;

pub use commands::{Cli, CommandExecutor, Commands};
pub use fetcher::{FetchOutcome, SnapshotFetcher};
pub use poller::{PollState, PriceMonitor};
pub use relay::{AttestationSubmitter, DryRunSubmitter, PriceRelay};
pub use server::ApiServer;
pub use services::{build_price_source, FullPriceService, SimplePriceService};
pub use tracker::PriceTracker;
