//! Exact cosine search over an in-process map.
//!
//! Linear scan on every query; the correctness baseline for retrieval.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use cloudguide_core::{rank_top_k, Chunk, SearchHit};

use super::{StoreError, VectorStore};

#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    chunks: RwLock<HashMap<String, Chunk>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_batch(&self, chunks: Vec<Chunk>) -> Result<(), StoreError> {
        let mut guard = self.chunks.write();
        for chunk in chunks {
            guard.insert(chunk.id.clone(), chunk);
        }
        Ok(())
    }

    async fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let guard = self.chunks.read();

        let ranked = rank_top_k(
            query,
            guard
                .values()
                .map(|chunk| (chunk.id.as_str(), chunk.embedding.as_slice())),
            k,
        );

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                guard.get(id).map(|chunk| SearchHit {
                    id: chunk.id.clone(),
                    doc_id: chunk.doc_id.clone(),
                    text: chunk.text.clone(),
                    score,
                })
            })
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
