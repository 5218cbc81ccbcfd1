use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::SnapshotSource;
use crate::shared::config::HermesCfg;
use crate::shared::errors::FetchError;
use crate::shared::types::{FeedId, RawQuote};

const PRICE_FEEDS_PATH: &str = "/api/latest_price_feeds";
const VAAS_PATH: &str = "/api/latest_vaas";

/// HTTP client for the Hermes price service
#[derive(Debug, Clone)]
pub struct HermesClient {
    http_client: Client,
    base_url: String,
}

impl HermesClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &HermesCfg) -> Result<Self, FetchError> {
        Self::new(config.base_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn price_feeds_request(&self, ids: &[FeedId]) -> RequestBuilder {
        let mut query = id_params(ids);
        query.push(("verbose", "true".to_string()));
        query.push(("binary", "false".to_string()));
        self.http_client
            .get(format!("{}{}", self.base_url, PRICE_FEEDS_PATH))
            .query(&query)
    }

    fn vaas_request(&self, ids: &[FeedId]) -> RequestBuilder {
        self.http_client
            .get(format!("{}{}", self.base_url, VAAS_PATH))
            .query(&id_params(ids))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, FetchError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Repeated `ids[]` parameters, one per feed
fn id_params(ids: &[FeedId]) -> Vec<(&'static str, String)> {
    ids.iter().map(|id| ("ids[]", id.to_string())).collect()
}

#[async_trait]
impl SnapshotSource for HermesClient {
    async fn latest_price_feeds(&self, ids: &[FeedId]) -> Result<Vec<RawQuote>, FetchError> {
        debug!("Requesting {} price feeds from {}", ids.len(), self.base_url);
        self.send_json(self.price_feeds_request(ids)).await
    }

    async fn latest_vaas(&self, ids: &[FeedId]) -> Result<Vec<String>, FetchError> {
        debug!("Requesting {} attestations from {}", ids.len(), self.base_url);
        self.send_json(self.vaas_request(ids)).await
    }
}
