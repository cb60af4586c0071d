//! The answering backend unit.
//!
//! Wraps one [`LlmProvider`] and answers two request kinds: topic
//! classification and generation. Every request runs as its own task so a
//! slow completion never holds up the mailbox. Failures become answer text.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::discovery::{BackendRef, ServiceRegistry, ANSWERING_SERVICE};
use crate::prompts;
use crate::providers::LlmProvider;
use crate::MAILBOX_CAPACITY;

/// Requests accepted by an answering backend.
#[derive(Debug)]
pub enum BackendCommand {
    /// Generate an answer for a prompt.
    Ask {
        prompt: String,
        reply: oneshot::Sender<String>,
    },

    /// Gate a query: replies `ALLOW` or `DECLINE`.
    Classify {
        text: String,
        reply: oneshot::Sender<String>,
    },

    /// Deregister and stop.
    Shutdown,
}

/// Owner's handle to a running backend.
pub struct BackendHandle {
    backend: BackendRef,
}

impl BackendHandle {
    pub fn id(&self) -> &str {
        &self.backend.id
    }

    pub fn backend_ref(&self) -> BackendRef {
        self.backend.clone()
    }

    /// Ask the backend to deregister and stop once queued requests are read.
    pub async fn shutdown(&self) {
        let _ = self.backend.tx.send(BackendCommand::Shutdown).await;
    }
}

/// Spawn a backend and register it for discovery.
pub fn spawn_backend(
    id: impl Into<String>,
    provider: Arc<dyn LlmProvider>,
    registry: ServiceRegistry,
) -> BackendHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let backend = BackendRef { id: id.into(), tx };

    tracing::info!(id = %backend.id, provider = provider.name(), "Answering backend started");
    registry.register(ANSWERING_SERVICE, backend.clone());
    tokio::spawn(run(backend.id.clone(), provider, registry, rx));

    BackendHandle { backend }
}

async fn run(
    id: String,
    provider: Arc<dyn LlmProvider>,
    registry: ServiceRegistry,
    mut rx: mpsc::Receiver<BackendCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            BackendCommand::Ask { prompt, reply } => {
                let provider = provider.clone();
                tokio::spawn(async move {
                    let _ = reply.send(ask(provider.as_ref(), &prompt).await);
                });
            }
            BackendCommand::Classify { text, reply } => {
                let provider = provider.clone();
                tokio::spawn(async move {
                    let _ = reply.send(classify(provider.as_ref(), &text).await.to_string());
                });
            }
            BackendCommand::Shutdown => break,
        }
    }

    registry.deregister(ANSWERING_SERVICE, &id);
    tracing::info!(id = %id, "Answering backend stopped");
}

async fn ask(provider: &dyn LlmProvider, prompt: &str) -> String {
    let config = provider.completion_config();
    match provider.complete(prompts::ask_messages(prompt), &config).await {
        Ok(response) if response.content.trim().is_empty() => {
            format!("{} empty response", provider.label())
        }
        Ok(response) => response.content,
        Err(e) => {
            tracing::warn!(provider = provider.name(), error = %e, "Generation failed");
            e.user_message(provider.label())
        }
    }
}

async fn classify(provider: &dyn LlmProvider, text: &str) -> &'static str {
    let mut config = provider.completion_config();
    config.temperature = 0.0;
    config.max_tokens = Some(5);

    match provider.complete(prompts::classify_messages(text), &config).await {
        Ok(response) => prompts::parse_verdict(&response.content),
        Err(e) => {
            tracing::warn!(provider = provider.name(), error = %e, "Classify failed, allowing");
            prompts::ALLOW
        }
    }
}
