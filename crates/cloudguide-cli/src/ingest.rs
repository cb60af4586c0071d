//! Offline ingestion of a directory of documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::warn;
use walkdir::WalkDir;

use cloudguide_core::ChunkConfig;
use cloudguide_runtime::{
    is_supported_file, open_store, spawn_ingestor, CloudGuideConfig, IngestSettings,
    IngestorHandle, OllamaEmbeddings,
};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub dir: PathBuf,
    pub doc_id_prefix: String,
    pub batch: usize,
    pub chunk: usize,
    pub overlap: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

/// Open the configured store (no fallback), then ingest every supported
/// file under `options.dir`.
pub async fn run(config: &CloudGuideConfig, options: &IngestOptions) -> Result<IngestSummary> {
    let chunk = ChunkConfig::new(options.chunk, options.overlap);
    chunk.validate()?;

    let store = open_store(config.rag.store, &config.qdrant, false)
        .await
        .context("Vector store unavailable")?;
    println!("VectorDB: {}", store.name());

    let embeddings = Arc::new(OllamaEmbeddings::from_config(&config.ollama)?);
    let ingestor = spawn_ingestor(
        embeddings,
        store,
        IngestSettings {
            chunk,
            embed_batch: Some(options.batch.max(1)),
        },
    );

    println!(
        "Ingesting from {} (chunk={} overlap={} batch={})",
        options.dir.display(),
        options.chunk,
        options.overlap,
        options.batch
    );
    ingest_directory(&ingestor, &options.dir, &options.doc_id_prefix).await
}

pub async fn ingest_directory(
    ingestor: &IngestorHandle,
    dir: &Path,
    prefix: &str,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for path in collect_documents(dir)? {
        let doc_id = doc_id_for(prefix, dir, &path);
        match ingestor.ingest_file(doc_id.clone(), path.clone()).await {
            Ok(report) if report.chunks == 0 => {
                println!("Skip (empty): {}", path.display());
                summary.skipped += 1;
            }
            Ok(report) => {
                println!("Ingested {} chunks from {}", report.chunks, report.doc_id);
                summary.documents += 1;
                summary.chunks += report.chunks;
            }
            Err(e) => {
                warn!(doc_id = %doc_id, error = %e, "Document failed");
                eprintln!("Failed {}: {}", doc_id, e);
                summary.failed.push(doc_id);
            }
        }
    }

    println!("DONE. Total chunks: {}", summary.chunks);
    Ok(summary)
}

/// Supported files under `dir`, in path order.
pub fn collect_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() && is_supported_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// `{prefix}:{path relative to dir}` with `/` separators.
pub fn doc_id_for(prefix: &str, dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}:{}", prefix, parts.join("/"))
}
