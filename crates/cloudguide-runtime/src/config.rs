//! Runtime configuration.
//!
//! Every field has a default, so an empty YAML document is a valid
//! configuration. Durations are written in human form (`"25s"`, `"10m"`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use cloudguide_core::ChunkConfig;

pub const LLM_BACKEND_ENV: &str = "LLM_BACKEND";
pub const OLLAMA_MODEL_ENV: &str = "OLLAMA_MODEL";
pub const HTTP_BIND_ENV: &str = "CLOUDGUIDE_HTTP_BIND";

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which answering backend serves generation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackendKind {
    /// Hosted OpenAI-compatible `/chat/completions`
    Openai,

    /// Local Ollama `/api/chat`
    Ollama,
}

impl LlmBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmBackendKind::Openai => "openai",
            LlmBackendKind::Ollama => "ollama",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Some(LlmBackendKind::Openai),
            "ollama" => Some(LlmBackendKind::Ollama),
            _ => None,
        }
    }
}

/// Vector store selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Qdrant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: LlmBackendKind,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackendKind::Openai,
        }
    }
}

/// Retry policy for rate-limited (429) responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first call
    pub max_retries: usize,

    #[serde(with = "duration_human")]
    pub base_delay: Duration,

    #[serde(with = "duration_human")]
    pub max_delay: Duration,

    /// Floor applied to a server-provided `Retry-After`
    #[serde(with = "duration_human")]
    pub min_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(4000),
            min_retry_after: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,

    /// Falls back to `OPENAI_API_KEY` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub temperature: f32,

    #[serde(with = "duration_human")]
    pub request_timeout: Duration,

    pub retry: RetryConfig,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.3,
            request_timeout: Duration::from_secs(20),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub embed_model: String,
    pub num_predict: u32,
    pub temperature: f32,

    #[serde(with = "duration_human")]
    pub request_timeout: Duration,

    #[serde(with = "duration_human")]
    pub embed_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            num_predict: 200,
            temperature: 0.2,
            request_timeout: Duration::from_secs(95),
            embed_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(with = "duration_human")]
    pub ttl: Duration,

    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub store: StoreKind,
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Memory,
            top_k: 4,
            max_context_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub host: String,
    pub port: u16,
    pub collection: String,
    pub dim: usize,
    pub distance: String,
    pub upsert_batch: usize,

    #[serde(with = "duration_human")]
    pub timeout: Duration,

    /// Use the in-memory store when Qdrant cannot be reached at startup
    pub allow_fallback_to_memory: bool,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6333,
            collection: "cloudguide".to_string(),
            dim: 768,
            distance: "Cosine".to_string(),
            upsert_batch: 64,
            timeout: Duration::from_secs(10),
            allow_fallback_to_memory: true,
        }
    }
}

impl QdrantConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub azure_base_url: String,
    pub max_pages: usize,

    #[serde(with = "duration_human")]
    pub request_timeout: Duration,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            azure_base_url: "https://prices.azure.com/api/retail/prices".to_string(),
            max_pages: 10,
            request_timeout: Duration::from_secs(8),
        }
    }
}

/// Per-hop timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "duration_human")]
    pub router_to_llm: Duration,

    #[serde(with = "duration_human")]
    pub router_to_pricing: Duration,

    #[serde(with = "duration_human")]
    pub classify: Duration,

    #[serde(with = "duration_human")]
    pub http_to_router: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            router_to_llm: Duration::from_secs(25),
            router_to_pricing: Duration::from_secs(6),
            classify: Duration::from_secs(4),
            http_to_router: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub backlog_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backlog_capacity: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
        }
    }
}

impl IngestConfig {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(self.chunk_size, self.chunk_overlap)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Complete CloudGuide configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudGuideConfig {
    pub llm: LlmConfig,
    pub openai: OpenAiConfig,
    pub ollama: OllamaConfig,
    pub cache: CacheConfig,
    pub rag: RagConfig,
    pub qdrant: QdrantConfig,
    pub pricing: PricingConfig,
    pub timeouts: TimeoutConfig,
    pub gateway: GatewayConfig,
    pub ingest: IngestConfig,
    pub http: HttpConfig,
}

impl CloudGuideConfig {
    /// Parse configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Apply `LLM_BACKEND`, `OLLAMA_MODEL` and `CLOUDGUIDE_HTTP_BIND`.
    ///
    /// `OPENAI_API_KEY` is read when the hosted provider is built.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(LLM_BACKEND_ENV).filter(|v| !v.trim().is_empty()) {
            self.llm.backend = LlmBackendKind::parse(&value).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "{} must be 'openai' or 'ollama', got '{}'",
                    LLM_BACKEND_ENV, value
                ))
            })?;
        }
        if let Some(model) = lookup(OLLAMA_MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.ollama.model = model;
        }
        if let Some(bind) = lookup(HTTP_BIND_ENV).filter(|v| !v.trim().is_empty()) {
            self.http.bind = bind;
        }
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ingest
            .chunk_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("ingest: {}", e)))?;

        if self.rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be positive".to_string()));
        }
        if self.gateway.backlog_capacity == 0 {
            return Err(ConfigError::Invalid(
                "gateway.backlog_capacity must be positive".to_string(),
            ));
        }
        if self.qdrant.dim == 0 {
            return Err(ConfigError::Invalid("qdrant.dim must be positive".to_string()));
        }
        if self.qdrant.upsert_batch == 0 {
            return Err(ConfigError::Invalid(
                "qdrant.upsert_batch must be positive".to_string(),
            ));
        }

        for (name, url) in [
            ("openai.base_url", &self.openai.base_url),
            ("ollama.base_url", &self.ollama.base_url),
            ("pricing.azure_base_url", &self.pricing.azure_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Serde adapter for durations written as `"25s"`, `"500ms"`, `"10m"`.
mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
