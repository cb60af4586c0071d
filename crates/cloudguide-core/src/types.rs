//! Data model shared by every CloudGuide unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Routing decision for a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    /// Answer with a live price quote.
    Pricing,

    /// Embed the question, retrieve context, then generate.
    RetrievalThenLlm,

    /// Gate on topic classification, then generate.
    LlmOnly,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Pricing => "PRICING",
            Plan::RetrievalThenLlm => "RETRIEVAL_THEN_LLM",
            Plan::LlmOnly => "LLM_ONLY",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a final answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Pricing,
    Llm,
}

impl Source {
    /// Value sent in the `X-Source` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Pricing => "PRICING",
            Source::Llm => "LLM",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal response for one user query.
///
/// Exactly one is delivered per query, whatever path the query took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// Caller identity (e.g. "http", "cli")
    pub user_id: String,

    /// Readable answer text, possibly describing unavailability
    pub text: String,

    /// Which path produced the answer
    pub source: Source,

    /// When the answer was produced
    pub answered_at: DateTime<Utc>,
}

impl FinalAnswer {
    pub fn new(user_id: impl Into<String>, text: impl Into<String>, source: Source) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            source,
            answered_at: Utc::now(),
        }
    }

    pub fn pricing(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(user_id, text, Source::Pricing)
    }

    pub fn llm(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(user_id, text, Source::Llm)
    }
}

/// Structured pricing lookup derived from a free-text question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuery {
    /// "azure" | "aws" | "gcp"
    pub provider: String,

    /// e.g. "Virtual Machines"
    pub service_name: String,

    /// e.g. "eastus"
    pub region: String,

    /// e.g. "D2as v5"
    pub sku_contains: String,

    /// Always "Consumption" for parsed queries
    pub price_type: String,

    /// Always "USD" for parsed queries
    pub currency_code: String,
}

impl PricingQuery {
    pub const DEFAULT_PRICE_TYPE: &'static str = "Consumption";
    pub const DEFAULT_CURRENCY: &'static str = "USD";

    pub fn new(
        provider: impl Into<String>,
        service_name: impl Into<String>,
        region: impl Into<String>,
        sku_contains: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            service_name: service_name.into(),
            region: region.into(),
            sku_contains: sku_contains.into(),
            price_type: Self::DEFAULT_PRICE_TYPE.to_string(),
            currency_code: Self::DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Serialized form used as the pricing cache key.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// A single retail price line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuote {
    pub provider: String,
    pub service_name: String,
    pub region: String,
    pub sku_name: String,
    pub meter_name: String,
    pub unit_of_measure: String,
    pub unit_price: f64,
    pub retail_price: f64,
    pub currency_code: String,
    pub effective_start_date: String,
    pub product_name: String,
}

/// Outcome of a pricing lookup.
///
/// Failures are values: `quote` is `None` and `note` explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    pub quote: Option<PricingQuote>,
    pub items_returned: u32,
    pub note: Option<String>,
}

impl PricingResult {
    pub fn found(quote: PricingQuote, items_returned: u32) -> Self {
        Self {
            quote: Some(quote),
            items_returned,
            note: None,
        }
    }

    pub fn not_found(note: impl Into<String>) -> Self {
        Self {
            quote: None,
            items_returned: 0,
            note: Some(note.into()),
        }
    }

    pub fn has_quote(&self) -> bool {
        self.quote.is_some()
    }
}

/// A bounded piece of a document with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{doc_id}#{index}`
    pub id: String,

    /// Parent document identifier
    pub doc_id: String,

    pub text: String,

    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn new(doc_id: &str, index: usize, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: format!("{}#{}", doc_id, index),
            doc_id: doc_id.to_string(),
            text: text.into(),
            embedding,
        }
    }
}

/// A nearest-neighbour match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub doc_id: String,
    pub text: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_distinguishes_queries() {
        let a = PricingQuery::new("azure", "Storage", "westus2", "Archive GRS");
        let b = PricingQuery::new("azure", "Storage", "westus", "Archive GRS");

        assert_eq!(a.cache_key(), a.clone().cache_key());
        assert_ne!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().contains("\"skuContains\":\"Archive GRS\""));
    }

    #[test]
    fn test_chunk_id_format() {
        let chunk = Chunk::new("aws-pricing", 3, "text", vec![0.1]);
        assert_eq!(chunk.id, "aws-pricing#3");
        assert_eq!(chunk.doc_id, "aws-pricing");
    }

    #[test]
    fn test_source_header_values() {
        assert_eq!(Source::Pricing.as_str(), "PRICING");
        assert_eq!(Source::Llm.to_string(), "LLM");
        assert_eq!(Plan::RetrievalThenLlm.to_string(), "RETRIEVAL_THEN_LLM");
    }

    #[test]
    fn test_not_found_result_has_no_quote() {
        let result = PricingResult::not_found("unsupported provider");
        assert!(!result.has_quote());
        assert_eq!(result.items_returned, 0);
        assert_eq!(result.note.as_deref(), Some("unsupported provider"));
    }
}
