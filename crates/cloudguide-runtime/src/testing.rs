//! Fakes shared by unit tests across the runtime.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use cloudguide_core::{Chunk, SearchHit};

use crate::backend::{spawn_backend, BackendHandle};
use crate::discovery::ServiceRegistry;
use crate::embeddings::{EmbeddingError, EmbeddingsProvider};
use crate::gateway::{spawn_gateway, GatewayHandle};
use crate::prompts::CLASSIFY_SYSTEM_PROMPT;
use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};
use crate::store::{StoreError, VectorStore};

/// Model that records every call. Classification answers `verdict`;
/// generation answers `answer`, or echoes the prompt when unset.
pub struct RecordingProvider {
    verdict: String,
    answer: Option<Result<String, ProviderError>>,
    asks: Mutex<Vec<String>>,
    classifies: Mutex<Vec<String>>,
}

impl RecordingProvider {
    pub fn echo(verdict: &str) -> Arc<Self> {
        Arc::new(Self {
            verdict: verdict.to_string(),
            answer: None,
            asks: Mutex::new(Vec::new()),
            classifies: Mutex::new(Vec::new()),
        })
    }

    pub fn answering(verdict: &str, answer: Result<&str, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            verdict: verdict.to_string(),
            answer: Some(answer.map(str::to_string)),
            asks: Mutex::new(Vec::new()),
            classifies: Mutex::new(Vec::new()),
        })
    }

    pub fn asks(&self) -> Vec<String> {
        self.asks.lock().clone()
    }

    pub fn classifies(&self) -> Vec<String> {
        self.classifies.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for RecordingProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let is_classify = messages
            .first()
            .map(|m| m.content == CLASSIFY_SYSTEM_PROMPT)
            .unwrap_or(false);
        let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();

        let content = if is_classify {
            self.classifies.lock().push(user);
            self.verdict.clone()
        } else {
            self.asks.lock().push(user.clone());
            match &self.answer {
                Some(answer) => answer.clone()?,
                None => user,
            }
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
        "recording"
    }

    fn label(&self) -> &str {
        "LLM"
    }
}

/// A registry with one backend over `provider` and a gateway subscribed to it.
pub fn gateway_with(provider: Arc<RecordingProvider>) -> (GatewayHandle, BackendHandle) {
    let registry = ServiceRegistry::new();
    let backend = spawn_backend("test-backend", provider, registry.clone());
    let gateway = spawn_gateway(&registry, 50);
    (gateway, backend)
}

const KEYWORDS: [&str; 3] = ["vm", "storage", "network"];

/// Three-dimensional keyword embeddings, so related texts rank together.
pub struct KeywordEmbeddings {
    fail: bool,
    drop_last: bool,
    batches: Mutex<usize>,
}

impl KeywordEmbeddings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            drop_last: false,
            batches: Mutex::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            drop_last: false,
            batches: Mutex::new(0),
        })
    }

    /// Returns one vector fewer than requested from `embed_batch`.
    pub fn short() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            drop_last: true,
            batches: Mutex::new(0),
        })
    }

    pub fn batches(&self) -> usize {
        *self.batches.lock()
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl EmbeddingsProvider for KeywordEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.fail {
            return Err(EmbeddingError::Http("connection refused".to_string()));
        }
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        *self.batches.lock() += 1;
        if self.fail {
            return Err(EmbeddingError::Http("connection refused".to_string()));
        }
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| Self::vector(t)).collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn name(&self) -> String {
        "keyword".to_string()
    }
}

/// Store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn upsert_batch(&self, _chunks: Vec<Chunk>) -> Result<(), StoreError> {
        Err(StoreError::Http("connection refused".to_string()))
    }

    async fn top_k(&self, _query: &[f32], _k: usize) -> Result<Vec<SearchHit>, StoreError> {
        Err(StoreError::Http("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
