//! # cloudguide-runtime
//!
//! The asynchronous half of CloudGuide.
//!
//! Every component is a unit: a spawned task that owns its state and
//! processes one mailbox message at a time. Callers talk to a unit through a
//! cloneable handle; replies come back over a oneshot channel and every hop
//! between units is bounded by a timeout.
//!
//! - [`router`] picks a plan for each query and always produces one answer
//! - [`pricing`] fetches and caches retail prices
//! - [`retrieval`] embeds a question and builds a grounded prompt
//! - [`gateway`] buffers answering requests until a backend is discovered
//! - [`backend`] classifies and answers through an LLM provider
//! - [`ingestor`] chunks, embeds and stores documents
//!
//! ## Example
//!
//! ```rust,ignore
//! use cloudguide_runtime::{CloudGuideConfig, RuntimeBuilder};
//!
//! let runtime = RuntimeBuilder::new(CloudGuideConfig::default()).build().await?;
//! let answer = runtime.router().ask("http", "price azure vm d2as v5 in eastus").await?;
//! println!("[{}] {}", answer.source, answer.text);
//! ```

use std::time::Duration;
use thiserror::Error;

pub mod backend;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod embeddings;
pub mod gateway;
pub mod ingestor;
pub mod pricing;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod retrieval;
pub mod router;
pub mod store;
pub mod system;

#[cfg(test)]
mod testing;

pub use backend::{spawn_backend, BackendCommand, BackendHandle};
pub use cache::{CachedPrice, PricingCache};
pub use config::{CloudGuideConfig, ConfigError, LlmBackendKind, StoreKind};
pub use discovery::{BackendRef, ServiceRegistry, ANSWERING_SERVICE};
pub use embeddings::{EmbeddingError, EmbeddingsProvider, OllamaEmbeddings};
pub use gateway::{spawn_gateway, GatewayHandle, GatewayStatus};
pub use ingestor::{is_supported_file, spawn_ingestor, IngestReport, IngestSettings, IngestorHandle};
pub use pricing::{spawn_pricing, AzureRetailPricingProvider, PricingHandle, PricingProvider};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use retrieval::{spawn_retrieval, RetrievalHandle, RetrievalSettings};
pub use router::{spawn_router, RouterHandle, RouterTimeouts};
pub use store::{InMemoryVectorStore, QdrantVectorStore, StoreError, VectorStore};
pub use system::{open_store, CloudGuideRuntime, RuntimeBuilder};

/// Mailbox depth for every unit.
pub const MAILBOX_CAPACITY: usize = 256;

/// Errors from unit wiring and the adapters behind it.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("{0} mailbox closed")]
    MailboxClosed(&'static str),

    #[error("{unit} did not reply within {timeout:?}")]
    Timeout {
        unit: &'static str,
        timeout: Duration,
    },

    #[error("Embedding count mismatch for {doc_id}: {got} vectors for {expected} chunks")]
    EmbeddingCountMismatch {
        doc_id: String,
        expected: usize,
        got: usize,
    },

    #[error("Unsupported file type: {0} (expected .txt, .md or .json)")]
    UnsupportedFile(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chunk(#[from] cloudguide_core::ChunkError),
}

/// Await a unit's reply, bounded by `timeout`.
pub(crate) async fn await_reply<T>(
    unit: &'static str,
    timeout: Duration,
    reply: tokio::sync::oneshot::Receiver<T>,
) -> Result<T, RuntimeError> {
    match tokio::time::timeout(timeout, reply).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(RuntimeError::MailboxClosed(unit)),
        Err(_) => Err(RuntimeError::Timeout { unit, timeout }),
    }
}
