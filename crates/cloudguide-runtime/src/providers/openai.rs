//! Hosted OpenAI-compatible provider (`/chat/completions`).
//!
//! Rate-limited responses are retried with backoff; every other failure is
//! returned as a [`ProviderError`] for the backend to turn into text.

use super::{
    secrets::ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider,
    ProviderError,
};
use crate::config::OpenAiConfig;
use crate::resilience::RateLimitRetry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable name for the hosted API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI-compatible chat provider.
///
/// A missing key is not a construction error: every call then fails with
/// [`ProviderError::NotConfigured`] so the user still gets an answer.
pub struct OpenAiProvider {
    credential: Option<ApiCredential>,
    base_url: String,
    model: String,
    temperature: f32,
    request_timeout: Duration,
    retry: RateLimitRetry,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(
        credential: Option<ApiCredential>,
        config: &OpenAiConfig,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(8))
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        Ok(Self {
            credential,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            request_timeout: config.request_timeout,
            retry: RateLimitRetry::new(config.retry.clone()),
            client,
        })
    }

    /// Build from configuration, reading `OPENAI_API_KEY` when the config
    /// carries no key.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self, ProviderError> {
        let credential = match ApiCredential::from_config_or_env(config.api_key.as_deref(), OPENAI_API_KEY_ENV) {
            Ok(credential) => {
                tracing::debug!(source = credential.source().as_str(), "Hosted model API key loaded");
                Some(credential)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Hosted model has no API key");
                None
            }
        };
        Self::new(credential, config)
    }

    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    async fn send_once(
        &self,
        credential: &ApiCredential,
        request: &ChatRequest<'_>,
        timeout: Duration,
    ) -> Result<CompletionResponse, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(credential.expose())
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        if status.is_success() {
            let parsed: ChatResponse =
                serde_json::from_str(&body).map_err(|e| ProviderError::ParseError(e.to_string()))?;

            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();

            return Ok(CompletionResponse {
                content,
                model: parsed.model.unwrap_or_else(|| request.model.to_string()),
            });
        }

        let detail = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error)
            .unwrap_or_default();

        match status.as_u16() {
            401 => Err(ProviderError::AuthError),
            429 => Err(ProviderError::RateLimited {
                retry_after,
                error_type: detail.type_,
            }),
            code => Err(ProviderError::ApiError {
                status: code,
                message: detail.message.unwrap_or_default(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type", default)]
    type_: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured(format!("missing {}", OPENAI_API_KEY_ENV)))?;

        let request = ChatRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        self.retry
            .run(|| self.send_once(credential, &request, config.timeout))
            .await
    }

    fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: None,
            temperature: self.temperature,
            timeout: self.request_timeout,
        }
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn label(&self) -> &str {
        "LLM"
    }
}
