//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use builtin::{builtin_catalog, QueryContext};
pub use tool::{Tool, ToolExecutionContext};
pub use types::AgentToolParameters;
pub use validation::validate_arguments;

use std::sync::Arc;

use tracing::debug;

use crate::error::QuarryError;
use crate::provider::ToolDefinition;
use crate::types::AgentToolCall;

/// Ordered set of tools offered to the model.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolCatalog {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions sent to the provider.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters().schema.clone(),
            })
            .collect()
    }

    /// Validate and run one call.
    pub async fn execute(
        &self,
        call: &AgentToolCall,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, QuarryError> {
        let tool = self.get(&call.name).ok_or_else(|| {
            QuarryError::InvalidArgument(format!(
                "unknown tool '{}'; available tools: {}",
                call.name,
                self.names().join(", ")
            ))
        })?;
        let args = ToolArguments::from_model(call.arguments.clone())?;
        validate_arguments(args.raw(), &tool.parameters().schema).map_err(|e| {
            QuarryError::InvalidArgument(format!("invalid arguments for '{}': {e}", call.name))
        })?;
        debug!(tool = %call.name, turn = ctx.turn, "executing tool");
        tool.execute(&args, ctx).await
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.names())
            .finish()
    }
}
