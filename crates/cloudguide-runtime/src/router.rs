//! The query router unit.
//!
//! Picks a plan for each query and drives it to exactly one
//! [`FinalAnswer`]. Every downstream call is bounded by a timeout and every
//! failure maps to answer text.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use cloudguide_core::{
    decide, format_quote, parse_pricing_query, pricing_not_found, FinalAnswer, Plan,
    RoutingDecision, DECLINE_REDIRECT, LLM_ERROR,
};

use crate::config::TimeoutConfig;
use crate::gateway::GatewayHandle;
use crate::pricing::PricingHandle;
use crate::prompts::ALLOW;
use crate::retrieval::RetrievalHandle;
use crate::{RuntimeError, MAILBOX_CAPACITY};

/// Per-hop timeouts used by the router.
#[derive(Debug, Clone)]
pub struct RouterTimeouts {
    pub pricing: Duration,
    pub classify: Duration,
    pub llm: Duration,
}

impl From<&TimeoutConfig> for RouterTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            pricing: config.router_to_pricing,
            classify: config.classify,
            llm: config.router_to_llm,
        }
    }
}

impl Default for RouterTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

struct UserQuery {
    user_id: String,
    text: String,
    reply: oneshot::Sender<FinalAnswer>,
}

#[derive(Clone)]
pub struct RouterHandle {
    tx: mpsc::Sender<UserQuery>,
}

impl RouterHandle {
    /// Route one query. The error case only covers a dead router.
    pub async fn ask(
        &self,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<FinalAnswer, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(UserQuery {
                user_id: user_id.into(),
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| RuntimeError::MailboxClosed("router"))?;
        rx.await.map_err(|_| RuntimeError::MailboxClosed("router"))
    }
}

#[derive(Clone)]
struct Dispatcher {
    pricing: PricingHandle,
    retrieval: RetrievalHandle,
    gateway: GatewayHandle,
    timeouts: RouterTimeouts,
}

pub fn spawn_router(
    pricing: PricingHandle,
    retrieval: RetrievalHandle,
    gateway: GatewayHandle,
    timeouts: RouterTimeouts,
) -> RouterHandle {
    let (tx, mut rx) = mpsc::channel::<UserQuery>(MAILBOX_CAPACITY);
    let dispatcher = Dispatcher {
        pricing,
        retrieval,
        gateway,
        timeouts,
    };

    tokio::spawn(async move {
        while let Some(query) = rx.recv().await {
            let decision = decide(&query.text);
            tracing::info!(plan = ?decision.plan, user_id = %query.user_id, "Plan selected");

            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let answer = dispatcher.dispatch(&query.user_id, &query.text, decision).await;
                tracing::info!(
                    user_id = %answer.user_id,
                    source = %answer.source,
                    chars = answer.text.len(),
                    "Final answer"
                );
                let _ = query.reply.send(answer);
            });
        }
        tracing::debug!("Router stopped");
    });

    RouterHandle { tx }
}

impl Dispatcher {
    async fn dispatch(&self, user_id: &str, text: &str, decision: RoutingDecision) -> FinalAnswer {
        match decision.plan {
            Plan::Pricing => self.pricing(user_id, &decision.normalized).await,
            Plan::RetrievalThenLlm => {
                let question = decision.question.unwrap_or_default();
                match self.retrieval.answer(user_id, question).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "Retrieval unavailable");
                        FinalAnswer::llm(user_id, LLM_ERROR)
                    }
                }
            }
            Plan::LlmOnly => self.llm_only(user_id, text.trim()).await,
        }
    }

    async fn pricing(&self, user_id: &str, normalized: &str) -> FinalAnswer {
        let query = parse_pricing_query(normalized);
        let lookup = tokio::time::timeout(self.timeouts.pricing, self.pricing.lookup(query.clone()));

        let text = match lookup.await {
            Ok(Ok(result)) => match &result.quote {
                Some(quote) => format_quote(quote),
                None => {
                    tracing::info!(note = ?result.note, "No quote");
                    pricing_not_found(&query)
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Pricing lookup failed");
                pricing_not_found(&query)
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeouts.pricing, "Pricing lookup timed out");
                pricing_not_found(&query)
            }
        };

        FinalAnswer::pricing(user_id, text)
    }

    async fn llm_only(&self, user_id: &str, text: &str) -> FinalAnswer {
        let allowed = match self.gateway.classify(text, self.timeouts.classify).await {
            Ok(verdict) => verdict.trim().eq_ignore_ascii_case(ALLOW),
            Err(e) => {
                tracing::warn!(error = %e, "Classification failed, declining");
                false
            }
        };

        if !allowed {
            tracing::info!(user_id, "Query declined by topic gate");
            return FinalAnswer::llm(user_id, DECLINE_REDIRECT);
        }

        match self.gateway.ask(text, self.timeouts.llm).await {
            Ok(answer) => FinalAnswer::llm(user_id, answer),
            Err(e) => {
                tracing::warn!(error = %e, "Generation failed");
                FinalAnswer::llm(user_id, LLM_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PricingCache;
    use crate::discovery::ServiceRegistry;
    use crate::gateway::spawn_gateway;
    use crate::pricing::{spawn_pricing, PricingProvider};
    use crate::retrieval::{spawn_retrieval, RetrievalSettings};
    use crate::store::InMemoryVectorStore;
    use crate::testing::{gateway_with, KeywordEmbeddings, RecordingProvider};
    use async_trait::async_trait;
    use cloudguide_core::{PricingQuery, PricingQuote, PricingResult, Source};
    use std::sync::Arc;

    /// Quotes whatever was asked for, optionally after a delay.
    struct EchoQuotes {
        delay: Duration,
    }

    #[async_trait]
    impl PricingProvider for EchoQuotes {
        fn supports(&self, provider_key: &str) -> bool {
            provider_key == "azure"
        }

        async fn fetch(&self, query: &PricingQuery) -> PricingResult {
            tokio::time::sleep(self.delay).await;
            PricingResult::found(
                PricingQuote {
                    provider: query.provider.clone(),
                    service_name: query.service_name.clone(),
                    region: query.region.clone(),
                    sku_name: query.sku_contains.clone(),
                    meter_name: format!("{} Data Stored", query.sku_contains),
                    unit_of_measure: "1 GB/Month".to_string(),
                    unit_price: 0.0045,
                    retail_price: 0.0045,
                    currency_code: "USD".to_string(),
                    effective_start_date: "2024-01-01T00:00:00Z".to_string(),
                    product_name: "Blob Storage".to_string(),
                },
                1,
            )
        }
    }

    fn router(provider: Arc<RecordingProvider>, quote_delay: Duration) -> RouterHandle {
        let (gateway, _backend) = gateway_with(provider);

        let quotes: Arc<dyn PricingProvider> = Arc::new(EchoQuotes { delay: quote_delay });
        let pricing = spawn_pricing(Arc::new(PricingCache::default()), vec![quotes]);
        let retrieval = spawn_retrieval(
            KeywordEmbeddings::new(),
            Arc::new(InMemoryVectorStore::new()),
            gateway.clone(),
            RetrievalSettings::default(),
        );
        spawn_router(pricing, retrieval, gateway, RouterTimeouts::default())
    }

    #[tokio::test]
    async fn test_pricing_answer_text() {
        let router = router(RecordingProvider::echo("ALLOW"), Duration::ZERO);

        let answer = router
            .ask("u1", "price azure storage archive grs in westus2")
            .await
            .unwrap();

        assert_eq!(answer.source, Source::Pricing);
        assert_eq!(
            answer.text,
            "[azure] Storage | region=westus2 | sku=Archive GRS | price=0.0045 USD (1 GB/Month)"
        );
    }

    #[tokio::test]
    async fn test_unsupported_provider_not_found_text() {
        let router = router(RecordingProvider::echo("ALLOW"), Duration::ZERO);

        let answer = router.ask("u1", "price of aws compute").await.unwrap();
        assert_eq!(answer.source, Source::Pricing);
        assert_eq!(
            answer.text,
            "No pricing found for aws Virtual Machines in us-east-1 (sku=D2as v5)."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pricing_times_out_to_not_found() {
        let router = router(RecordingProvider::echo("ALLOW"), Duration::from_secs(30));

        let answer = router.ask("u1", "cost of azure vm d4s v5 in eastus").await.unwrap();
        assert_eq!(
            answer.text,
            "No pricing found for azure Virtual Machines in eastus (sku=D4s v5)."
        );
    }

    #[tokio::test]
    async fn test_declined_query_never_generates() {
        let provider = RecordingProvider::echo("DECLINE");
        let router = router(provider.clone(), Duration::ZERO);

        let answer = router.ask("u1", "what's the weather").await.unwrap();

        assert_eq!(answer.text, DECLINE_REDIRECT);
        assert_eq!(answer.source, Source::Llm);
        assert_eq!(provider.classifies(), vec!["what's the weather".to_string()]);
        assert!(provider.asks().is_empty());
    }

    #[tokio::test]
    async fn test_allowed_query_generates() {
        let provider = RecordingProvider::answering("ALLOW", Ok("Use VNet peering."));
        let router = router(provider.clone(), Duration::ZERO);

        let answer = router.ask("u1", "  how do I connect two vnets?  ").await.unwrap();

        assert_eq!(answer.text, "Use VNet peering.");
        assert_eq!(provider.asks(), vec!["how do I connect two vnets?".to_string()]);
    }

    #[tokio::test]
    async fn test_ask_prefix_goes_through_retrieval() {
        let provider = RecordingProvider::echo("ALLOW");
        let router = router(provider.clone(), Duration::ZERO);

        let answer = router.ask("u1", "ASK: what does storage cost?").await.unwrap();

        assert_eq!(answer.source, Source::Llm);
        assert!(answer.text.ends_with("Question: what does storage cost?"));
        assert!(provider.classifies().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_backend_still_answers() {
        let registry = ServiceRegistry::new();
        let gateway = spawn_gateway(&registry, 50);
        let quotes: Arc<dyn PricingProvider> = Arc::new(EchoQuotes {
            delay: Duration::ZERO,
        });
        let pricing = spawn_pricing(Arc::new(PricingCache::default()), vec![quotes]);
        let retrieval = spawn_retrieval(
            KeywordEmbeddings::new(),
            Arc::new(InMemoryVectorStore::new()),
            gateway.clone(),
            RetrievalSettings::default(),
        );
        let router = spawn_router(pricing, retrieval, gateway, RouterTimeouts::default());

        let answer = router.ask("u1", "explain kubernetes").await.unwrap();
        assert_eq!(answer.text, DECLINE_REDIRECT);

        let answer = router.ask("u1", "ask: explain kubernetes").await.unwrap();
        assert_eq!(answer.text, LLM_ERROR);
    }

    #[tokio::test]
    async fn test_concurrent_queries_each_answered_once() {
        let router = router(RecordingProvider::echo("ALLOW"), Duration::ZERO);

        let mut tasks = Vec::new();
        for i in 0..20 {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                let text = match i % 3 {
                    0 => format!("price azure vm in eastus {}", i),
                    1 => format!("ask: question {}", i),
                    _ => format!("tell me about regions {}", i),
                };
                router.ask(format!("u{}", i), text).await.unwrap()
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            let answer = task.await.unwrap();
            assert_eq!(answer.user_id, format!("u{}", i));
            assert!(!answer.text.is_empty());
        }
    }
}
