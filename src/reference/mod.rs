/*
 * Reference savings-rate fetchers
 *
 * Analytics endpoints supplying the headline Sky Savings Rate attached to
 * route decisions. Display data only: a failed fetch degrades to no
 * annotation and never blocks routing.
 */

mod block_analitica;
mod sky;

use async_trait::async_trait;

use crate::config::RateSource;
use crate::models::{ReferenceRate, Result};

pub use block_analitica::BlockAnaliticaClient;
pub use sky::SkyApiClient;

#[async_trait]
pub trait RateReference: Send + Sync {
    async fn savings_rate(&self) -> Result<ReferenceRate>;
}

#[must_use]
pub fn create_rate_reference(source: RateSource) -> Box<dyn RateReference> {
    match source {
        RateSource::Sky => Box::new(SkyApiClient::new()),
        RateSource::BlockAnalitica => Box::new(BlockAnaliticaClient::new()),
    }
}
