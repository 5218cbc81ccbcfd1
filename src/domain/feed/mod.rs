//! Feed domain - symbol registry and snapshot normalization

mod registry;
mod normalizer;

pub use registry::{FeedRegistry, BUILTIN_FEEDS};
pub use normalizer::{build_quote, publish_timestamp, SnapshotNormalizer};
