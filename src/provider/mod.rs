//! Model provider trait and the built-in OpenAI-compatible provider.
//!
//! The agent loop treats a provider as a pure `transcript -> action`
//! function: it sends the rendered transcript plus the tool catalog and gets
//! back either tool calls or final text.

pub mod factory;
pub mod http;
pub mod registry;

#[cfg(feature = "openai")]
pub mod openai;

pub use factory::ProviderFactory;
pub use registry::ProviderRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QuarryError;
use crate::types::{AgentToolCall, ModelMessage, Usage};

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// Response from a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<AgentToolCall>,
    pub finish_reason: Option<FinishReason>,
}

/// Core trait implemented by all model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "ollama").
    fn provider_name(&self) -> &str;
    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Propose the next action for a transcript.
    async fn propose(&self, request: &ProviderRequest) -> Result<ProviderResponse, QuarryError>;
}
