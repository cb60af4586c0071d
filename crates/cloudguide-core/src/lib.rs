//! # cloudguide-core
//!
//! Deterministic building blocks for CloudGuide.
//!
//! This crate answers the questions that never need I/O:
//! - Which plan does a query follow?
//! - What pricing lookup does a pricing question describe?
//! - How is a document cut into retrievable chunks?
//! - How similar are two embeddings?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No network calls**: Providers, stores and backends live in `cloudguide-runtime`
//! 3. **Total**: Every function returns a value; parsing never fails, it falls back to defaults
//!
//! ## Example
//!
//! ```rust
//! use cloudguide_core::{decide, parse_pricing_query, Plan};
//!
//! let decision = decide("price azure storage archive grs in westus2");
//! assert_eq!(decision.plan, Plan::Pricing);
//!
//! let query = parse_pricing_query(&decision.normalized);
//! assert_eq!(query.service_name, "Storage");
//! assert_eq!(query.region, "westus2");
//! assert_eq!(query.sku_contains, "Archive GRS");
//! ```

pub mod answer;
pub mod chunker;
pub mod routing;
pub mod similarity;
pub mod types;

// Re-export main types at crate root
pub use answer::{format_quote, pricing_not_found, DECLINE_REDIRECT, EMBEDDING_ERROR, LLM_ERROR};
pub use chunker::{chunk_spans, chunk_text, normalize_whitespace, ChunkConfig, ChunkError, ChunkSpan};
pub use routing::{decide, parse_pricing_query, RoutingDecision};
pub use similarity::{cosine_similarity, rank_top_k};
pub use types::{
    Chunk, FinalAnswer, Plan, PricingQuery, PricingQuote, PricingResult, SearchHit, Source,
};
