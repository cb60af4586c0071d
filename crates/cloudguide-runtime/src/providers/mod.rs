//! Answering-backend model providers.
//!
//! This module defines the trait for chat-completion providers and the two
//! implementations CloudGuide ships: a hosted OpenAI-compatible API and a
//! local Ollama server.
//!
//! ## Security
//!
//! The hosted provider keeps its key in an [`ApiCredential`], see the
//! [`secrets`] module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
mod ollama;
mod openai;
pub mod secrets;

pub use factory::{OllamaProviderFactory, OpenAiProviderFactory, ProviderFactory, ProviderRegistry};
pub use ollama::OllamaProvider;
pub use openai::{OpenAiProvider, OPENAI_API_KEY_ENV};
pub use secrets::{ApiCredential, CredentialSource};

/// Errors from model providers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Option<Duration>,
        error_type: Option<String>,
    },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Readable answer text for this failure, prefixed with the provider label.
    pub fn user_message(&self, label: &str) -> String {
        match self {
            ProviderError::NotConfigured(reason) => format!("{} not configured ({})", label, reason),
            ProviderError::AuthError => format!("{} HTTP 401 (check API key)", label),
            ProviderError::RateLimited { error_type, .. }
                if error_type.as_deref() == Some("insufficient_quota") =>
            {
                format!("{} 429 insufficient_quota (add billing/credits)", label)
            }
            ProviderError::RateLimited { .. } => format!("{} HTTP 429 (rate limited)", label),
            ProviderError::ApiError { status, message } if message.is_empty() => {
                format!("{} HTTP {}", label, status)
            }
            ProviderError::ApiError { status, message } => {
                format!("{} HTTP {}: {}", label, status, message)
            }
            ProviderError::ParseError(_) => format!("{} parse error", label),
            ProviderError::HttpError(detail) => format!("{} error: {}", label, detail),
            ProviderError::Timeout(after) => {
                format!("{} error: request timed out after {:?}", label, after)
            }
        }
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: None,
            temperature: 0.3,
            timeout: Duration::from_secs(20),
        }
    }
}

/// A chat message for completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Response from a completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Model used
    pub model: String,
}

/// Provider abstraction allows swapping model backends.
///
/// The answering backend is the only caller.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Request defaults (model, temperature, timeout) for this provider.
    fn completion_config(&self) -> CompletionConfig;

    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Prefix used in user-visible error text ("LLM", "Ollama").
    fn label(&self) -> &str;
}
