use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::UpstreamStation;

#[async_trait]
pub trait StationSource: Send + Sync + 'static {
    async fn fetch_stations(&self) -> Result<Vec<UpstreamStation>, FetchError>;

    /// Whether a fetch can be attempted at all with the current settings.
    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Missing API key")]
    MissingApiKey,
    #[error("upstream responded with HTTP {status}")]
    Status { status: u16 },
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct JcDecauxClient {
    http: reqwest::Client,
    base_url: String,
    contract: String,
    api_key: Option<String>,
}

impl JcDecauxClient {
    pub fn new(
        base_url: &str,
        contract: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            contract: contract.to_string(),
            api_key,
        })
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[async_trait]
impl StationSource for JcDecauxClient {
    async fn fetch_stations(&self) -> Result<Vec<UpstreamStation>, FetchError> {
        // checked on every call: the key may be absent at boot
        let Some(api_key) = self.api_key() else {
            return Err(FetchError::MissingApiKey);
        };

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("contract", self.contract.as_str()), ("apiKey", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let stations: Vec<UpstreamStation> = serde_json::from_slice(&body)?;

        tracing::debug!(
            contract = %self.contract,
            stations = stations.len(),
            "upstream station snapshot received"
        );

        Ok(stations)
    }

    fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}
