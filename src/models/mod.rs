//! Model identifiers and selection.

pub mod selector;

pub use selector::ModelSelector;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model used when neither the request nor the config names one.
pub const DEFAULT_MODEL: &str = "openai:gpt-4o";

/// A language model identified by provider key + model ID.
///
/// Resolved to a concrete provider via [`crate::provider::ProviderRegistry`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LanguageModel {
    pub provider_key: String,
    pub model_id: String,
}

impl LanguageModel {
    pub fn new(provider_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_key: provider_key.into(),
            model_id: model_id.into(),
        }
    }

    /// Get the model's API identifier string.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Get the provider name.
    pub fn provider_name(&self) -> &str {
        &self.provider_key
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_key, self.model_id)
    }
}
