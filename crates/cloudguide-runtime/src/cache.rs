//! Time-bounded cache of pricing results.
//!
//! Only results that carry a quote are stored, so a failed lookup is retried
//! on the next identical query.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::time::Duration;

use cloudguide_core::{PricingQuery, PricingResult};

use crate::config::CacheConfig;

/// A cached lookup and when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPrice {
    pub result: PricingResult,
    pub fetched_at: DateTime<Utc>,
}

/// Pricing cache keyed by [`PricingQuery::cache_key`].
pub struct PricingCache {
    cache: Cache<String, CachedPrice>,
}

impl PricingCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub async fn get(&self, query: &PricingQuery) -> Option<CachedPrice> {
        self.cache.get(&query.cache_key()).await
    }

    /// Store a result. Returns `false` without storing when there is no quote.
    pub async fn insert(&self, query: &PricingQuery, result: PricingResult) -> bool {
        if !result.has_quote() {
            return false;
        }

        self.cache
            .insert(
                query.cache_key(),
                CachedPrice {
                    result,
                    fetched_at: Utc::now(),
                },
            )
            .await;
        true
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for PricingCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
