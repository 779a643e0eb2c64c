//! Latest exchange rate lookup against the hexarate API.
//!
//! Only the lookup lives here. Balances are never converted.
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub base: String,
    pub target: String,
    pub mid: Decimal,
    pub unit: u32,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("request to rate provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate provider answered with status {0}")]
    Status(u16),
}

#[async_trait]
pub trait RateLookup: Send + Sync {
    async fn latest_rate(&self, base: &str, target: &str) -> Result<Rate, RateError>;
}

#[derive(Deserialize)]
struct ApiResponse {
    status_code: u16,
    data: Rate,
}

pub struct HexarateClient {
    http: reqwest::Client,
    base_url: String,
}

impl HexarateClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RateLookup for HexarateClient {
    async fn latest_rate(&self, base: &str, target: &str) -> Result<Rate, RateError> {
        let url = format!("{}/{base}?target={target}", self.base_url);
        tracing::debug!("fetching rate {base}/{target} from {url}");

        let response = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<ApiResponse>()
            .await?;

        if response.status_code != 200 {
            return Err(RateError::Status(response.status_code));
        }
        Ok(response.data)
    }
}
