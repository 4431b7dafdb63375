use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::QueryContext;
use crate::error::QuarryError;
use crate::learning::DEFAULT_RETRIEVE_LIMIT;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

pub struct LearnTool {
    context: Arc<QueryContext>,
    parameters: AgentToolParameters,
}

impl LearnTool {
    pub fn new(context: Arc<QueryContext>) -> Self {
        Self {
            context,
            parameters: AgentToolParameters::object()
                .string("question", "The question to find prior queries for.", true)
                .build(),
        }
    }
}

#[async_trait]
impl Tool for LearnTool {
    fn name(&self) -> &str {
        "learn"
    }

    fn description(&self) -> &str {
        "Retrieve previously successful queries and table notes related to a question."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<Value, QuarryError> {
        let learning = self.context.learning.as_ref().ok_or_else(|| {
            QuarryError::Authentication("no learning service is configured".into())
        })?;
        let question = args.get_str("question")?;
        let entries = learning.retrieve(question, DEFAULT_RETRIEVE_LIMIT).await?;
        Ok(json!({ "question": question, "prior": entries }))
    }
}
