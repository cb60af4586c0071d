//! Pricing providers and the pricing unit.
//!
//! Providers never fail past their boundary: transport and parse problems
//! come back as a [`PricingResult`] with no quote and an explanatory note.

use async_trait::async_trait;

use cloudguide_core::{PricingQuery, PricingResult};

mod azure;
mod fetcher;

pub use azure::AzureRetailPricingProvider;
pub use fetcher::{spawn_pricing, PricingHandle};

#[async_trait]
pub trait PricingProvider: Send + Sync {
    /// Whether this provider serves the given provider key ("azure", "aws").
    fn supports(&self, provider_key: &str) -> bool;

    async fn fetch(&self, query: &PricingQuery) -> PricingResult;
}
