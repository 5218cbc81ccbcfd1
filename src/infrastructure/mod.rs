//! Infrastructure layer - outbound adapters

pub mod hermes;
pub mod retry;

pub use hermes::{HermesClient, SnapshotSource};
pub use retry::RetryPolicy;
