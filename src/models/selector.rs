//! Model selection and parsing.

use std::str::FromStr;

use super::LanguageModel;
use crate::error::QuarryError;

/// Parse a "provider:model" string into a LanguageModel.
pub struct ModelSelector;

impl ModelSelector {
    /// Parse "provider:model_id" into a LanguageModel.
    ///
    /// Whether the provider is registered is checked later, by
    /// `ProviderRegistry::create_provider()`.
    ///
    /// Examples: "openai:gpt-4o", "ollama:llama3.3", "openai:ft:gpt-4o:my-org"
    pub fn parse(s: &str) -> Result<LanguageModel, QuarryError> {
        let (provider, model_id) = s
            .split_once(':')
            .filter(|(provider, model_id)| !provider.is_empty() && !model_id.is_empty())
            .ok_or_else(|| {
                QuarryError::Configuration(format!(
                    "Invalid model selector '{s}': expected 'provider:model_id'"
                ))
            })?;

        Ok(LanguageModel::new(provider.trim(), model_id.trim()))
    }
}

impl FromStr for LanguageModel {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelSelector::parse(s)
    }
}
