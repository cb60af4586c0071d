//! The retrieval unit: embed the question, gather context, ask the gateway.
//!
//! Each question is handled by its own continuation task, so the unit keeps
//! reading its mailbox while embeddings and generation are in flight.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use cloudguide_core::{FinalAnswer, SearchHit, EMBEDDING_ERROR, LLM_ERROR};

use crate::embeddings::EmbeddingsProvider;
use crate::gateway::GatewayHandle;
use crate::prompts::build_retrieval_prompt;
use crate::store::VectorStore;
use crate::{RuntimeError, MAILBOX_CAPACITY};

/// Tunables for one retrieval unit.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_context_chars: usize,
    pub llm_timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_context_chars: 4000,
            llm_timeout: Duration::from_secs(25),
        }
    }
}

struct Question {
    user_id: String,
    question: String,
    reply: oneshot::Sender<FinalAnswer>,
}

#[derive(Clone)]
pub struct RetrievalHandle {
    tx: mpsc::Sender<Question>,
}

impl RetrievalHandle {
    /// Answer a question from retrieved context. Always resolves to an
    /// answer unless the unit itself is gone.
    pub async fn answer(
        &self,
        user_id: impl Into<String>,
        question: impl Into<String>,
    ) -> Result<FinalAnswer, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Question {
                user_id: user_id.into(),
                question: question.into(),
                reply,
            })
            .await
            .map_err(|_| RuntimeError::MailboxClosed("retrieval"))?;
        rx.await.map_err(|_| RuntimeError::MailboxClosed("retrieval"))
    }
}

#[derive(Clone)]
struct Pipeline {
    embeddings: Arc<dyn EmbeddingsProvider>,
    store: Arc<dyn VectorStore>,
    gateway: GatewayHandle,
    settings: RetrievalSettings,
}

pub fn spawn_retrieval(
    embeddings: Arc<dyn EmbeddingsProvider>,
    store: Arc<dyn VectorStore>,
    gateway: GatewayHandle,
    settings: RetrievalSettings,
) -> RetrievalHandle {
    let (tx, mut rx) = mpsc::channel::<Question>(MAILBOX_CAPACITY);
    let pipeline = Pipeline {
        embeddings,
        store,
        gateway,
        settings,
    };

    tokio::spawn(async move {
        while let Some(question) = rx.recv().await {
            tracing::info!(user_id = %question.user_id, "Retrieval started");
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let answer = pipeline.run(&question.user_id, &question.question).await;
                let _ = question.reply.send(answer);
            });
        }
        tracing::debug!("Retrieval unit stopped");
    });

    RetrievalHandle { tx }
}

impl Pipeline {
    async fn run(&self, user_id: &str, question: &str) -> FinalAnswer {
        let embedding = match self.embeddings.embed(question).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Question embedding failed");
                return FinalAnswer::llm(user_id, EMBEDDING_ERROR);
            }
        };

        let hits = match self.store.top_k(&embedding, self.settings.top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(store = self.store.name(), error = %e, "Search failed, answering without context");
                Vec::new()
            }
        };

        let context = build_context(&hits, self.settings.max_context_chars);
        tracing::debug!(hits = hits.len(), context_chars = context.chars().count(), "Context assembled");

        let prompt = build_retrieval_prompt(&context, question);
        match self.gateway.ask(prompt, self.settings.llm_timeout).await {
            Ok(text) => FinalAnswer::llm(user_id, text),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Generation failed");
                FinalAnswer::llm(user_id, LLM_ERROR)
            }
        }
    }
}

/// Hit texts as `- ` bullet lines, cut to at most `max_chars` characters.
pub fn build_context(hits: &[SearchHit], max_chars: usize) -> String {
    let context = hits
        .iter()
        .map(|hit| format!("- {}", hit.text))
        .collect::<Vec<_>>()
        .join("\n");

    match context.char_indices().nth(max_chars) {
        Some((cut, _)) => context[..cut].to_string(),
        None => context,
    }
}
