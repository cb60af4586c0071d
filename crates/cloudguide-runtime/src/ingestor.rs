//! The document ingestor unit.
//!
//! Chunks a document, embeds every chunk, and only then writes the chunks to
//! the vector store. A document is stored completely or not at all; a
//! failing document never affects others in flight.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use cloudguide_core::{chunk_text, Chunk, ChunkConfig};

use crate::embeddings::EmbeddingsProvider;
use crate::store::VectorStore;
use crate::{RuntimeError, MAILBOX_CAPACITY};

const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "md", "json"];

/// Whether `path` has an extension the ingestor reads as plain text.
pub fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    pub chunk: ChunkConfig,

    /// Chunks per embedding request; `None` embeds a document in one call.
    pub embed_batch: Option<usize>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig::default(),
            embed_batch: None,
        }
    }
}

/// Outcome of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub doc_id: String,
    pub chunks: usize,
}

enum DocumentSource {
    Text(String),
    File(PathBuf),
}

struct IngestRequest {
    doc_id: String,
    source: DocumentSource,
    reply: Option<oneshot::Sender<Result<IngestReport, RuntimeError>>>,
}

#[derive(Clone)]
pub struct IngestorHandle {
    tx: mpsc::Sender<IngestRequest>,
}

impl IngestorHandle {
    async fn send(&self, request: IngestRequest) -> Result<(), RuntimeError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| RuntimeError::MailboxClosed("ingestor"))
    }

    async fn request(&self, doc_id: String, source: DocumentSource) -> Result<IngestReport, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(IngestRequest {
            doc_id,
            source,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::MailboxClosed("ingestor"))?
    }

    /// Ingest already-extracted text and wait for the outcome.
    pub async fn ingest_text(
        &self,
        doc_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<IngestReport, RuntimeError> {
        self.request(doc_id.into(), DocumentSource::Text(text.into())).await
    }

    /// Ingest a `.txt`, `.md` or `.json` file and wait for the outcome.
    pub async fn ingest_file(
        &self,
        doc_id: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<IngestReport, RuntimeError> {
        self.request(doc_id.into(), DocumentSource::File(path.into())).await
    }

    /// Queue a file without waiting. Unsupported extensions are rejected
    /// here; read and store failures are only logged.
    pub async fn submit_file(
        &self,
        doc_id: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<(), RuntimeError> {
        let path = path.into();
        if !is_supported_file(&path) {
            return Err(RuntimeError::UnsupportedFile(path.display().to_string()));
        }
        self.send(IngestRequest {
            doc_id: doc_id.into(),
            source: DocumentSource::File(path),
            reply: None,
        })
        .await
    }
}

#[derive(Clone)]
struct Ingestor {
    embeddings: Arc<dyn EmbeddingsProvider>,
    store: Arc<dyn VectorStore>,
    settings: IngestSettings,
}

pub fn spawn_ingestor(
    embeddings: Arc<dyn EmbeddingsProvider>,
    store: Arc<dyn VectorStore>,
    settings: IngestSettings,
) -> IngestorHandle {
    let (tx, mut rx) = mpsc::channel::<IngestRequest>(MAILBOX_CAPACITY);
    let ingestor = Ingestor {
        embeddings,
        store,
        settings,
    };

    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let ingestor = ingestor.clone();
            tokio::spawn(async move {
                let result = ingestor.ingest(&request.doc_id, request.source).await;
                if let Err(e) = &result {
                    tracing::warn!(doc_id = %request.doc_id, error = %e, "Ingestion failed");
                }
                if let Some(reply) = request.reply {
                    let _ = reply.send(result);
                }
            });
        }
        tracing::debug!("Ingestor stopped");
    });

    IngestorHandle { tx }
}

impl Ingestor {
    async fn ingest(&self, doc_id: &str, source: DocumentSource) -> Result<IngestReport, RuntimeError> {
        let text = match source {
            DocumentSource::Text(text) => text,
            DocumentSource::File(path) => read_document(&path).await?,
        };
        self.ingest_text(doc_id, &text).await
    }

    async fn ingest_text(&self, doc_id: &str, text: &str) -> Result<IngestReport, RuntimeError> {
        let pieces = chunk_text(text, &self.settings.chunk)?;
        if pieces.is_empty() {
            tracing::warn!(doc_id, "Empty document, skipped");
            return Ok(IngestReport {
                doc_id: doc_id.to_string(),
                chunks: 0,
            });
        }

        let vectors = self.embed_all(&pieces).await?;
        if vectors.len() != pieces.len() {
            return Err(RuntimeError::EmbeddingCountMismatch {
                doc_id: doc_id.to_string(),
                expected: pieces.len(),
                got: vectors.len(),
            });
        }

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (text, embedding))| Chunk::new(doc_id, index, text, embedding))
            .collect();
        let count = chunks.len();

        self.store.upsert_batch(chunks).await?;
        tracing::info!(doc_id, chunks = count, store = self.store.name(), "Document ingested");

        Ok(IngestReport {
            doc_id: doc_id.to_string(),
            chunks: count,
        })
    }

    async fn embed_all(&self, pieces: &[String]) -> Result<Vec<Vec<f32>>, RuntimeError> {
        let batch = self.settings.embed_batch.unwrap_or(pieces.len()).max(1);
        let mut vectors = Vec::with_capacity(pieces.len());
        for group in pieces.chunks(batch) {
            vectors.extend(self.embeddings.embed_batch(group).await?);
        }
        Ok(vectors)
    }
}

async fn read_document(path: &Path) -> Result<String, RuntimeError> {
    if !is_supported_file(path) {
        return Err(RuntimeError::UnsupportedFile(path.display().to_string()));
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RuntimeError::Io {
            path: path.display().to_string(),
            source,
        })
}
