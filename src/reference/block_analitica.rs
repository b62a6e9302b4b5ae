/*
 * Block Analitica rate client
 */

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::models::{JanusError, ReferenceRate, Result};
use crate::reference::RateReference;

const DEFAULT_BASE_URL: &str = "https://api.blockanalitica.com/v1";

pub struct BlockAnaliticaClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    results: Vec<RateEntry>,
}

#[derive(Debug, Deserialize)]
struct RateEntry {
    apy: String,
}

impl Default for BlockAnaliticaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockAnaliticaClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RateReference for BlockAnaliticaClient {
    async fn savings_rate(&self) -> Result<ReferenceRate> {
        let url = format!("{}/sky/savings-rate/", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<RateResponse>()
            .await
            .map_err(|e| {
                JanusError::ReferenceApiError(format!(
                    "Failed to parse Block Analitica response: {e}"
                ))
            })?;

        let entry = response.results.first().ok_or_else(|| {
            JanusError::ReferenceApiError("No rate entries in response".to_string())
        })?;

        // Reported as a percentage ("4.75").
        let apy_percent = Decimal::from_str(&entry.apy)
            .map_err(|e| JanusError::ReferenceApiError(format!("Failed to parse rate: {e}")))?;

        Ok(ReferenceRate {
            source: "BlockAnalitica".to_string(),
            apy_percent,
            fetched_at: Utc::now(),
        })
    }
}
