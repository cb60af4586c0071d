//! Offline stand-ins for the model, embeddings and pricing APIs.

use std::sync::Arc;

use async_trait::async_trait;

use cloudguide_core::{PricingQuery, PricingQuote, PricingResult};
use cloudguide_runtime::prompts::{ALLOW, CLASSIFY_SYSTEM_PROMPT};
use cloudguide_runtime::providers::{ChatMessage, CompletionConfig, CompletionResponse};
use cloudguide_runtime::{
    spawn_gateway, spawn_pricing, spawn_retrieval, spawn_router, EmbeddingError, EmbeddingsProvider,
    LlmProvider, PricingCache, PricingProvider, ProviderError, RetrievalSettings, RouterHandle,
    RouterTimeouts, ServiceRegistry, VectorStore,
};

/// Allows every topic and answers `echo: <prompt>`.
pub struct EchoModel;

#[async_trait]
impl LlmProvider for EchoModel {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let is_classify = messages.first().map(|m| m.content.as_str()) == Some(CLASSIFY_SYSTEM_PROMPT);
        let content = if is_classify {
            ALLOW.to_string()
        } else {
            let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
            format!("echo: {}", prompt)
        };
        Ok(CompletionResponse {
            content,
            model: config.model.clone(),
        })
    }

    fn completion_config(&self) -> CompletionConfig {
        CompletionConfig::default()
    }

    fn name(&self) -> &str {
        "echo"
    }

    fn label(&self) -> &str {
        "LLM"
    }
}

/// Same vector for every text.
pub struct FlatEmbeddings;

#[async_trait]
impl EmbeddingsProvider for FlatEmbeddings {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![1.0, 0.0, 0.0])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }

    fn name(&self) -> String {
        "flat".to_string()
    }
}

/// Quotes 0.0045 USD for any Azure lookup.
pub struct FixedPrice;

pub fn quote_for(query: &PricingQuery) -> PricingQuote {
    PricingQuote {
        provider: query.provider.clone(),
        service_name: query.service_name.clone(),
        region: query.region.clone(),
        sku_name: query.sku_contains.clone(),
        meter_name: "Data Stored".to_string(),
        unit_of_measure: "1 GB/Month".to_string(),
        unit_price: 0.0045,
        retail_price: 0.0045,
        currency_code: "USD".to_string(),
        effective_start_date: "2024-01-01T00:00:00Z".to_string(),
        product_name: "Blob Storage".to_string(),
    }
}

#[async_trait]
impl PricingProvider for FixedPrice {
    fn supports(&self, provider: &str) -> bool {
        provider == "azure"
    }

    async fn fetch(&self, query: &PricingQuery) -> PricingResult {
        PricingResult::found(quote_for(query), 1)
    }
}

/// A router whose gateway never sees a backend, so anything past pricing
/// waits on the topic check.
pub fn router_without_backend(store: Arc<dyn VectorStore>) -> RouterHandle {
    let registry = ServiceRegistry::new();
    let gateway = spawn_gateway(&registry, 50);
    let pricing = spawn_pricing(
        Arc::new(PricingCache::default()),
        vec![Arc::new(FixedPrice) as Arc<dyn PricingProvider>],
    );
    let retrieval = spawn_retrieval(
        Arc::new(FlatEmbeddings),
        store,
        gateway.clone(),
        RetrievalSettings::default(),
    );
    spawn_router(pricing, retrieval, gateway, RouterTimeouts::default())
}
