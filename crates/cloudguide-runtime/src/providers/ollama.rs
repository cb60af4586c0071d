//! Local Ollama chat provider (`/api/chat`).

use super::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};
use crate::config::OllamaConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    num_predict: u32,
    temperature: f32,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn from_config(config: &OllamaConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(8))
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            num_predict: config.num_predict,
            temperature: config.temperature,
            request_timeout: config.request_timeout,
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    #[serde(default)]
    error: String,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = OllamaChatRequest {
            model: &config.model,
            messages: &messages,
            stream: false,
            options: OllamaOptions {
                num_predict: config.max_tokens,
                temperature: config.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(format!(
                        "{} (is 'ollama serve' running and model '{}' pulled?)",
                        e, config.model
                    ))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaError>(&body)
                .map(|e| e.error)
                .unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: OllamaChatResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(CompletionResponse {
            content: parsed.message.map(|m| m.content).unwrap_or_default(),
            model: parsed.model.unwrap_or_else(|| config.model.clone()),
        })
    }

    fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: Some(self.num_predict),
            temperature: self.temperature,
            timeout: self.request_timeout,
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn label(&self) -> &str {
        "Ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: String) -> OllamaProvider {
        OllamaProvider::from_config(&OllamaConfig {
            base_url,
            ..OllamaConfig::default()
        })
        .unwrap()
    }

    async fn ask(provider: &OllamaProvider) -> Result<CompletionResponse, ProviderError> {
        provider
            .complete(vec![ChatMessage::user("hi")], &provider.completion_config())
            .await
    }

    #[tokio::test]
    async fn test_chat_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3",
                "stream": false,
                "options": { "num_predict": 200 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3",
                "message": { "role": "assistant", "content": "Use spot VMs." },
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = ask(&provider(server.uri())).await.unwrap();
        assert_eq!(response.content, "Use spot VMs.");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "model 'llama3' not found"})))
            .mount(&server)
            .await;

        let err = ask(&provider(server.uri())).await.unwrap_err();
        assert_eq!(
            err.user_message("Ollama"),
            "Ollama HTTP 404: model 'llama3' not found"
        );
    }

    #[tokio::test]
    async fn test_missing_message_is_empty_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
            .mount(&server)
            .await;

        let response = ask(&provider(server.uri())).await.unwrap();
        assert!(response.content.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_mentions_model() {
        // Nothing listens on port 9 locally.
        let err = ask(&provider("http://127.0.0.1:9".to_string()))
            .await
            .unwrap_err();
        let text = err.user_message("Ollama");
        assert!(text.starts_with("Ollama error: "));
        assert!(text.contains("model 'llama3' pulled?"));
    }
}
