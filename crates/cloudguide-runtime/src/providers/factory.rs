//! Provider factory pattern for answering-backend selection.
//!
//! The backend kind is chosen once from configuration; the registry maps
//! that name to a factory that builds the provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{LlmProvider, OllamaProvider, OpenAiProvider, ProviderError};
use crate::config::CloudGuideConfig;

/// Factory for creating model providers from configuration.
pub trait ProviderFactory: Send + Sync {
    /// Unique identifier, matching `llm.backend` in configuration.
    fn provider_type(&self) -> &'static str;

    /// Create a provider instance from configuration.
    fn create(&self, config: &CloudGuideConfig) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Validate configuration without creating a provider.
    fn validate_config(&self, config: &CloudGuideConfig) -> Result<(), ProviderError>;
}

fn check_base_url(name: &str, url: &str) -> Result<(), ProviderError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ProviderError::NotConfigured(format!(
            "{} must start with http:// or https://",
            name
        )));
    }
    Ok(())
}

/// Hosted OpenAI-compatible backend.
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &CloudGuideConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(OpenAiProvider::from_config(&config.openai)?))
    }

    fn validate_config(&self, config: &CloudGuideConfig) -> Result<(), ProviderError> {
        check_base_url("openai.base_url", &config.openai.base_url)
    }
}

/// Local Ollama backend.
pub struct OllamaProviderFactory;

impl ProviderFactory for OllamaProviderFactory {
    fn provider_type(&self) -> &'static str {
        "ollama"
    }

    fn create(&self, config: &CloudGuideConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(OllamaProvider::from_config(&config.ollama)?))
    }

    fn validate_config(&self, config: &CloudGuideConfig) -> Result<(), ProviderError> {
        check_base_url("ollama.base_url", &config.ollama.base_url)?;
        if config.ollama.model.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "ollama.model must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Registry of available provider factories.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory, replacing any with the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    /// Validate, then create a provider of the named type.
    pub fn create(
        &self,
        provider_type: &str,
        config: &CloudGuideConfig,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let factory = self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })?;
        factory.validate_config(config)?;
        factory.create(config)
    }

    /// List available provider types.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Registry with the hosted and local backends registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OpenAiProviderFactory));
        registry.register(Arc::new(OllamaProviderFactory));
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}
