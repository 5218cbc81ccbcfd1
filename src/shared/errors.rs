//! Error handling for the application

use thiserror::Error;

/// Network-layer errors raised while talking to the upstream price API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    #[error("All {attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Timeout | FetchError::Status { .. } => true,
            FetchError::Decode(_) | FetchError::Exhausted { .. } => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Price feed errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Symbol not found in feed registry: {0}")]
    UnknownSymbol(String),

    #[error("Invalid symbol '{0}', expected BASE/QUOTE")]
    InvalidSymbol(String),

    #[error("Invalid feed id '{0}', expected 32 bytes of hex")]
    InvalidFeedId(String),

    #[error("Feed id {feed_id} is already registered for {symbol}")]
    DuplicateFeed { feed_id: String, symbol: String },

    #[error("Malformed snapshot entry for feed {feed_id}: {reason}")]
    MalformedSnapshot { feed_id: String, reason: String },

    #[error("No price data available for {0}")]
    NoData(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Attestation relay errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("Failed to fetch attestations: {0}")]
    Attestation(String),

    #[error("Invalid attestation payload: {0}")]
    Decode(String),

    #[error("Submission failed: {0}")]
    Submission(String),
}

impl From<FetchError> for RelayError {
    fn from(err: FetchError) -> Self {
        RelayError::Attestation(err.to_string())
    }
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Relay error: {0}")]
    Relay(String),
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        AppError::Feed(err.to_string())
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::Feed(err.to_string())
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        AppError::Relay(err.to_string())
    }
}
