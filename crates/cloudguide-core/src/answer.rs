//! Fixed answer texts and quote formatting.

use crate::types::{PricingQuery, PricingQuote};

/// Reply for queries the topic gate declines.
pub const DECLINE_REDIRECT: &str = "I focus on cloud topics (AWS, Azure, GCP, pricing, architecture, DevOps/SRE). Ask me about cloud and I’ll help right away!";

/// Reply when a generation call fails or times out.
pub const LLM_ERROR: &str = "LLM error";

/// Reply when the question cannot be embedded.
pub const EMBEDDING_ERROR: &str = "Embedding error";

/// Render a quote as a single line.
///
/// `[azure] Storage | region=westus2 | sku=Archive GRS | price=0.0020 USD (1 GB/Month)`
pub fn format_quote(quote: &PricingQuote) -> String {
    format!(
        "[{}] {} | region={} | sku={} | price={:.4} {} ({})",
        quote.provider,
        quote.service_name,
        quote.region,
        quote.sku_name,
        quote.retail_price,
        quote.currency_code,
        quote.unit_of_measure
    )
}

/// Deterministic "not found" reply naming the parsed parameters.
pub fn pricing_not_found(query: &PricingQuery) -> String {
    format!(
        "No pricing found for {} {} in {} (sku={}).",
        query.provider, query.service_name, query.region, query.sku_contains
    )
}
