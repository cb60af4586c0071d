//! Vector stores for retrieval.
//!
//! Both implementations are safe for concurrent readers and writers without
//! caller-side locking.

use async_trait::async_trait;
use thiserror::Error;

use cloudguide_core::{Chunk, SearchHit};

mod memory;
mod qdrant;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Embedding dim mismatch for id={id}: got {got}, expected {expected}")]
    DimensionMismatch {
        id: String,
        got: usize,
        expected: usize,
    },

    #[error("Vector store request failed: {0}")]
    Http(String),

    #[error("Vector store {operation} HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Vector store parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace one chunk by id.
    async fn upsert(&self, chunk: Chunk) -> Result<(), StoreError> {
        self.upsert_batch(vec![chunk]).await
    }

    /// Insert or replace chunks by id.
    async fn upsert_batch(&self, chunks: Vec<Chunk>) -> Result<(), StoreError>;

    /// Up to `k` hits, most similar first. `k == 0` yields nothing.
    async fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError>;

    fn name(&self) -> &str;
}
