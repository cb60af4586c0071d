//! Qdrant REST vector store.
//!
//! Vectors live under the named vector `default`. Point ids are name-based
//! UUIDs of the chunk id, so re-ingesting a chunk replaces it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use cloudguide_core::{Chunk, SearchHit};

use super::{StoreError, VectorStore};
use crate::config::QdrantConfig;

const VECTOR_NAME: &str = "default";

#[derive(Debug)]
pub struct QdrantVectorStore {
    base_url: String,
    collection: String,
    dim: usize,
    distance: String,
    upsert_batch: usize,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    payload: PointPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointPayload {
    #[serde(default)]
    doc_id: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    text: String,
}

/// Deterministic Qdrant point id for a chunk id.
pub fn point_id(chunk_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, chunk_id.as_bytes())
}

impl QdrantVectorStore {
    pub fn new(config: &QdrantConfig) -> Result<Self, StoreError> {
        Self::with_base_url(config.base_url(), config)
    }

    pub fn with_base_url(base_url: impl Into<String>, config: &QdrantConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            dim: config.dim,
            distance: config.distance.clone(),
            upsert_batch: config.upsert_batch.max(1),
            client,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    fn check_dim(&self, id: &str, embedding: &[f32]) -> Result<(), StoreError> {
        if embedding.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                id: id.to_string(),
                got: embedding.len(),
                expected: self.dim,
            });
        }
        Ok(())
    }

    /// Create the collection with the configured dimension and distance if
    /// it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let url = self.collection_url();
        let existing = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if existing.status().is_success() {
            tracing::debug!(collection = %self.collection, "Qdrant collection exists");
            return Ok(());
        }

        let body = json!({
            "vectors": {
                "default": { "size": self.dim, "distance": self.distance }
            }
        });

        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                operation: "create collection",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        tracing::info!(
            collection = %self.collection,
            dim = self.dim,
            distance = %self.distance,
            "Created Qdrant collection"
        );
        Ok(())
    }

    async fn put_points(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        let points: Vec<serde_json::Value> = chunks
            .iter()
            .map(|chunk| {
                json!({
                    "id": point_id(&chunk.id).to_string(),
                    "vector": { "default": chunk.embedding },
                    "payload": {
                        "docId": chunk.doc_id,
                        "source": chunk.id,
                        "text": chunk.text,
                    }
                })
            })
            .collect();

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                operation: "upsert",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert_batch(&self, chunks: Vec<Chunk>) -> Result<(), StoreError> {
        for chunk in &chunks {
            self.check_dim(&chunk.id, &chunk.embedding)?;
        }

        for batch in chunks.chunks(self.upsert_batch) {
            self.put_points(batch).await?;
        }
        Ok(())
    }

    async fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        self.check_dim("query", query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let body = json!({
            "vector": { "name": VECTOR_NAME, "vector": query },
            "limit": k,
            "with_payload": true,
            "with_vector": false,
        });

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(StoreError::Status {
                operation: "search",
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: SearchResponse =
            serde_json::from_str(&text).map_err(|e| StoreError::Parse(e.to_string()))?;

        Ok(parsed
            .result
            .into_iter()
            .map(|point| SearchHit {
                id: point.payload.source.unwrap_or_else(|| match point.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }),
                doc_id: point.payload.doc_id,
                text: point.payload.text,
                score: point.score,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
