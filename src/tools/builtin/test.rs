use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::QueryContext;
use crate::error::QuarryError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

/// Reachability check for one source. Never fails.
pub struct TestTool {
    context: Arc<QueryContext>,
    parameters: AgentToolParameters,
}

impl TestTool {
    pub fn new(context: Arc<QueryContext>) -> Self {
        Self {
            context,
            parameters: AgentToolParameters::object()
                .string("source", "Identity of the source to test.", true)
                .build(),
        }
    }
}

#[async_trait]
impl Tool for TestTool {
    fn name(&self) -> &str {
        "test"
    }

    fn description(&self) -> &str {
        "Check whether a source is reachable. Use it when a source returns connection errors."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<Value, QuarryError> {
        let name = args.get_str("source")?;
        match self.context.sources.get(name) {
            Ok(source) => Ok(json!({ "source": name, "reachable": source.test().await })),
            Err(e) => Ok(json!({ "source": name, "reachable": false, "error": e.to_string() })),
        }
    }
}
