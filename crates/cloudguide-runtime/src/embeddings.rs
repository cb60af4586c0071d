//! Text embedding providers.
//!
//! `embed_batch` returns vectors one-to-one with its input, or an error;
//! there are no partial results.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

use crate::config::OllamaConfig;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Http(String),

    #[error("Embedding HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No 'embedding' array in response")]
    MissingEmbedding,

    #[error("Embedding parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait EmbeddingsProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn name(&self) -> String;
}

/// Ollama `/api/embeddings`, one request per text.
#[derive(Debug)]
pub struct OllamaEmbeddings {
    endpoint: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

impl OllamaEmbeddings {
    pub fn from_config(config: &OllamaConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(8))
            .build()
            .map_err(|e| EmbeddingError::Http(e.to_string()))?;

        Ok(Self {
            endpoint: format!("{}/api/embeddings", config.base_url.trim_end_matches('/')),
            model: config.embed_model.clone(),
            timeout: config.embed_timeout,
            client,
        })
    }
}

/// Accepts `{"embedding": [...]}` or `{"data": [{"embedding": [...]}]}`.
fn parse_embedding(root: &JsonValue) -> Result<Vec<f32>, EmbeddingError> {
    let values = root
        .get("embedding")
        .and_then(JsonValue::as_array)
        .or_else(|| {
            root.get("data")
                .and_then(|d| d.get(0))
                .and_then(|first| first.get("embedding"))
                .and_then(JsonValue::as_array)
        })
        .ok_or(EmbeddingError::MissingEmbedding)?;

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbeddingError::Parse(format!("non-numeric component: {}", v)))
        })
        .collect()
}

#[async_trait]
impl EmbeddingsProvider for OllamaEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let root: JsonValue =
            serde_json::from_str(&body).map_err(|e| EmbeddingError::Parse(e.to_string()))?;
        parse_embedding(&root)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        tracing::debug!(
            model = %self.model,
            count = vectors.len(),
            dim = vectors.first().map(Vec::len).unwrap_or(0),
            "Embedded batch"
        );
        Ok(vectors)
    }

    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }
}
