/*
 * Sky ecosystem API rate client
 */

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::models::{JanusError, ReferenceRate, Result};
use crate::reference::RateReference;

const DEFAULT_BASE_URL: &str = "https://info-sky.blockanalitica.com/api/v1";

pub struct SkyApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SkyRateResponse {
    sky_savings_rate_apy: String,
}

impl Default for SkyApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SkyApiClient {
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
impl RateReference for SkyApiClient {
    async fn savings_rate(&self) -> Result<ReferenceRate> {
        let url = format!("{}/overall/", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<SkyRateResponse>()
            .await
            .map_err(|e| {
                JanusError::ReferenceApiError(format!("Failed to parse Sky response: {e}"))
            })?;

        // The API reports the APY as a fraction ("0.0475").
        let fraction = Decimal::from_str(&response.sky_savings_rate_apy)
            .map_err(|e| JanusError::ReferenceApiError(format!("Failed to parse rate: {e}")))?;

        Ok(ReferenceRate {
            source: "Sky".to_string(),
            apy_percent: fraction * Decimal::from(100),
            fetched_at: Utc::now(),
        })
    }
}
