//! Provider registry for dynamic provider resolution.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ModelProvider, ProviderFactory};
use crate::config::QuarryConfig;
use crate::error::QuarryError;
use crate::models::LanguageModel;

/// Registry mapping provider keys to their factories.
#[derive(Clone)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in factory enabled by crate features.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::openai::OpenAiFactory));
        registry
    }

    /// Register a factory for all provider keys it declares.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        for key in factory.provider_keys() {
            self.factories.insert(key.to_string(), factory.clone());
        }
    }

    /// Create a provider instance by looking up the registered factory.
    pub fn create_provider(
        &self,
        provider_key: &str,
        model_id: &str,
        config: &QuarryConfig,
    ) -> Result<Box<dyn ModelProvider>, QuarryError> {
        self.factories
            .get(provider_key)
            .ok_or_else(|| {
                QuarryError::Configuration(format!(
                    "No provider factory registered for '{provider_key}'"
                ))
            })?
            .create(config, provider_key, model_id)
    }

    /// Create a shareable provider for a parsed model.
    pub fn resolve(
        &self,
        model: &LanguageModel,
        config: &QuarryConfig,
    ) -> Result<Arc<dyn ModelProvider>, QuarryError> {
        self.create_provider(model.provider_name(), model.model_id(), config)
            .map(Arc::from)
    }

    /// Check whether a factory is registered for the given key.
    pub fn has_provider(&self, provider_key: &str) -> bool {
        self.factories.contains_key(provider_key)
    }

    /// List all registered provider keys.
    pub fn provider_keys(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys = self.provider_keys();
        keys.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("providers", &keys)
            .finish()
    }
}
