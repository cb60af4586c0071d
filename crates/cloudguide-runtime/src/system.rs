//! Runtime assembly.
//!
//! [`RuntimeBuilder`] turns a [`CloudGuideConfig`] into a running set of
//! units. Any collaborator can be replaced before `build`, which is how the
//! tests run the whole system without a network.

use std::sync::Arc;

use crate::backend::{spawn_backend, BackendHandle};
use crate::cache::PricingCache;
use crate::config::{CloudGuideConfig, QdrantConfig, StoreKind};
use crate::discovery::ServiceRegistry;
use crate::embeddings::{EmbeddingsProvider, OllamaEmbeddings};
use crate::gateway::{spawn_gateway, GatewayHandle};
use crate::ingestor::{spawn_ingestor, IngestSettings, IngestorHandle};
use crate::pricing::{spawn_pricing, AzureRetailPricingProvider, PricingProvider};
use crate::providers::{LlmProvider, ProviderError, ProviderRegistry};
use crate::retrieval::{spawn_retrieval, RetrievalSettings};
use crate::router::{spawn_router, RouterHandle, RouterTimeouts};
use crate::store::{InMemoryVectorStore, QdrantVectorStore, VectorStore};
use crate::RuntimeError;

/// Open the configured vector store.
///
/// A Qdrant collection is created if missing. When Qdrant cannot be reached
/// and `allow_fallback` is set, an in-memory store is returned instead.
pub async fn open_store(
    kind: StoreKind,
    qdrant: &QdrantConfig,
    allow_fallback: bool,
) -> Result<Arc<dyn VectorStore>, RuntimeError> {
    match kind {
        StoreKind::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
        StoreKind::Qdrant => {
            let store = QdrantVectorStore::new(qdrant)?;
            match store.ensure_collection().await {
                Ok(()) => {
                    tracing::info!(url = %qdrant.base_url(), collection = %qdrant.collection, "Using Qdrant store");
                    Ok(Arc::new(store))
                }
                Err(e) if allow_fallback => {
                    tracing::warn!(error = %e, "Qdrant unavailable, falling back to in-memory store");
                    Ok(Arc::new(InMemoryVectorStore::new()))
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// A running CloudGuide system.
pub struct CloudGuideRuntime {
    config: CloudGuideConfig,
    registry: ServiceRegistry,
    backend: BackendHandle,
    gateway: GatewayHandle,
    router: RouterHandle,
    ingestor: IngestorHandle,
    store: Arc<dyn VectorStore>,
    cache: Arc<PricingCache>,
}

impl CloudGuideRuntime {
    pub fn router(&self) -> &RouterHandle {
        &self.router
    }

    pub fn ingestor(&self) -> &IngestorHandle {
        &self.ingestor
    }

    pub fn gateway(&self) -> &GatewayHandle {
        &self.gateway
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CloudGuideConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn pricing_cache(&self) -> &Arc<PricingCache> {
        &self.cache
    }

    /// Deregister the answering backend. Handles held elsewhere keep their
    /// units alive until dropped.
    pub async fn shutdown(self) {
        self.backend.shutdown().await;
        tracing::info!("CloudGuide runtime shut down");
    }
}

/// Builder for [`CloudGuideRuntime`].
pub struct RuntimeBuilder {
    config: CloudGuideConfig,
    provider: Option<Arc<dyn LlmProvider>>,
    embeddings: Option<Arc<dyn EmbeddingsProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    pricing_providers: Vec<Arc<dyn PricingProvider>>,
    registry: ServiceRegistry,
}

impl RuntimeBuilder {
    pub fn new(config: CloudGuideConfig) -> Self {
        Self {
            config,
            provider: None,
            embeddings: None,
            store: None,
            pricing_providers: Vec::new(),
            registry: ServiceRegistry::new(),
        }
    }

    /// Answering model; defaults to the configured backend kind.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Embeddings provider; defaults to Ollama.
    pub fn embeddings(mut self, embeddings: Arc<dyn EmbeddingsProvider>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Vector store; defaults to the configured store kind.
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Add a pricing provider. With none added, Azure retail pricing is used.
    pub fn pricing_provider(mut self, provider: Arc<dyn PricingProvider>) -> Self {
        self.pricing_providers.push(provider);
        self
    }

    /// Share an existing discovery registry.
    pub fn registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub async fn build(self) -> Result<CloudGuideRuntime, RuntimeError> {
        let config = self.config;
        config.validate()?;

        let provider = match self.provider {
            Some(provider) => provider,
            None => {
                let providers = ProviderRegistry::with_defaults();
                providers.create(config.llm.backend.as_str(), &config)?
            }
        };

        let embeddings: Arc<dyn EmbeddingsProvider> = match self.embeddings {
            Some(embeddings) => embeddings,
            None => Arc::new(OllamaEmbeddings::from_config(&config.ollama)?),
        };

        let store = match self.store {
            Some(store) => store,
            None => {
                open_store(
                    config.rag.store,
                    &config.qdrant,
                    config.qdrant.allow_fallback_to_memory,
                )
                .await?
            }
        };

        let pricing_providers = if self.pricing_providers.is_empty() {
            let azure = AzureRetailPricingProvider::from_config(&config.pricing)
                .map_err(|e| ProviderError::HttpError(e.to_string()))?;
            vec![Arc::new(azure) as Arc<dyn PricingProvider>]
        } else {
            self.pricing_providers
        };

        let registry = self.registry;
        let backend = spawn_backend(
            format!("{}-backend", provider.name()),
            provider.clone(),
            registry.clone(),
        );
        let gateway = spawn_gateway(&registry, config.gateway.backlog_capacity);

        let cache = Arc::new(PricingCache::from_config(&config.cache));
        let pricing = spawn_pricing(cache.clone(), pricing_providers);

        let retrieval = spawn_retrieval(
            embeddings.clone(),
            store.clone(),
            gateway.clone(),
            RetrievalSettings {
                top_k: config.rag.top_k,
                max_context_chars: config.rag.max_context_chars,
                llm_timeout: config.timeouts.router_to_llm,
            },
        );

        let router = spawn_router(
            pricing,
            retrieval,
            gateway.clone(),
            RouterTimeouts::from(&config.timeouts),
        );

        let ingestor = spawn_ingestor(
            embeddings,
            store.clone(),
            IngestSettings {
                chunk: config.ingest.chunk_config(),
                embed_batch: None,
            },
        );

        tracing::info!(
            backend = provider.name(),
            store = store.name(),
            backlog = config.gateway.backlog_capacity,
            "CloudGuide runtime started"
        );

        Ok(CloudGuideRuntime {
            config,
            registry,
            backend,
            gateway,
            router,
            ingestor,
            store,
            cache,
        })
    }
}
