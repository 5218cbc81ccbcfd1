//! TOML configuration with defaults for every field

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::errors::AppError;
use crate::shared::types::{FeedId, FeedSymbol};

pub const DEFAULT_CONFIG_FILE: &str = "pythfeed.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HermesCfg {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HermesCfg {
    fn default() -> Self {
        Self {
            base_url: "https://hermes.pyth.network".to_string(),
            timeout_secs: 10,
        }
    }
}

/// How the delay between retries grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `retry_delay * attempt`
    Linear,
    Fixed,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestCfg {
    /// Total attempts per batch, including the first one
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub batch_size: usize,
    pub backoff: BackoffKind,
}

impl Default for RequestCfg {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            batch_size: 20,
            backoff: BackoffKind::Linear,
        }
    }
}

/// Which price source implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Batched requests with retries
    Full,
    /// One request per call, no retries
    Simple,
}

impl std::str::FromStr for ServiceMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(ServiceMode::Full),
            "simple" => Ok(ServiceMode::Simple),
            other => Err(AppError::ConfigError(format!("unknown service mode: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceCfg {
    pub mode: ServiceMode,
}

impl Default for ServiceCfg {
    fn default() -> Self {
        Self { mode: ServiceMode::Full }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerCfg {
    pub interval_secs: u64,
    pub stop_timeout_secs: u64,
    pub analytics_window_secs: u64,
}

impl Default for TrackerCfg {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            stop_timeout_secs: 5,
            analytics_window_secs: 24 * 60 * 60,
        }
    }
}

impl TrackerCfg {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn analytics_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.analytics_window_secs as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerCfg {
    pub host: String,
    pub port: u16,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub hermes: HermesCfg,
    pub request: RequestCfg,
    pub service: ServiceCfg,
    pub tracker: TrackerCfg,
    pub server: ServerCfg,
    /// Extra or overriding `"SYMBOL" = "0x..."` entries
    pub feeds: BTreeMap<String, String>,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.request.batch_size == 0 {
            return Err(AppError::ConfigError("request.batch_size must be at least 1".into()));
        }
        if self.request.max_retries == 0 {
            return Err(AppError::ConfigError("request.max_retries must be at least 1".into()));
        }
        if self.tracker.interval_secs == 0 {
            return Err(AppError::ConfigError("tracker.interval_secs must be at least 1".into()));
        }
        self.feed_overrides().map(|_| ())
    }

    /// Parsed `[feeds]` table
    pub fn feed_overrides(&self) -> Result<Vec<(FeedSymbol, FeedId)>, AppError> {
        self.feeds
            .iter()
            .map(|(symbol, id)| {
                let symbol = FeedSymbol::parse(symbol)
                    .map_err(|e| AppError::ConfigError(format!("feeds: {}", e)))?;
                let id = FeedId::parse(id).map_err(|e| AppError::ConfigError(format!("feeds: {}", e)))?;
                Ok((symbol, id))
            })
            .collect()
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from an explicit path, else `pythfeed.toml` when present, else defaults
    pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
        match path {
            Some(path) => AppConfig::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => AppConfig::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(AppConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.request.batch_size, 20);
        assert_eq!(config.request.max_retries, 3);
        assert_eq!(config.hermes.timeout_secs, 10);
        assert_eq!(config.tracker.stop_timeout_secs, 5);
        assert_eq!(config.service.mode, ServiceMode::Full);
    }

    #[test]
    fn test_partial_config() {
        let config = AppConfig::from_toml_str(
            r#"
            [request]
            batch_size = 5
            backoff = "fixed"

            [service]
            mode = "simple"

            [feeds]
            "xyz-usd" = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
            "#,
        )
        .unwrap();
        assert_eq!(config.request.batch_size, 5);
        assert_eq!(config.request.max_retries, 3);
        assert_eq!(config.request.backoff, BackoffKind::Fixed);
        assert_eq!(config.service.mode, ServiceMode::Simple);

        let overrides = config.feed_overrides().unwrap();
        assert_eq!(overrides[0].0.as_str(), "XYZ/USD");
    }

    #[test]
    fn test_validation_rejects_zero_batch() {
        let err = AppConfig::from_toml_str("[request]\nbatch_size = 0").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_validation_rejects_bad_feed_id() {
        let err = AppConfig::from_toml_str("[feeds]\n\"BTC/USD\" = \"0x1234\"").unwrap_err();
        assert!(err.to_string().contains("feeds"));
    }

    #[test]
    fn test_service_mode_from_str() {
        assert_eq!("FULL".parse::<ServiceMode>().unwrap(), ServiceMode::Full);
        assert!("fancy".parse::<ServiceMode>().is_err());
    }
}
