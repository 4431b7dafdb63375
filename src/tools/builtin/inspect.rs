use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::QueryContext;
use crate::datasource::Capability;
use crate::error::QuarryError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

pub struct InspectTool {
    context: Arc<QueryContext>,
    parameters: AgentToolParameters,
}

impl InspectTool {
    pub fn new(context: Arc<QueryContext>) -> Self {
        Self {
            context,
            parameters: AgentToolParameters::object()
                .string("source", "Identity of the source.", true)
                .string("table", "Qualified table name as listed by discover, without the source prefix.", true)
                .build(),
        }
    }
}

#[async_trait]
impl Tool for InspectTool {
    fn name(&self) -> &str {
        "inspect"
    }

    fn description(&self) -> &str {
        "Show the columns of a table (or the parameters of an API endpoint). \
         Inspect before writing a query against a table."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<Value, QuarryError> {
        let source = self.context.source(args, Capability::Inspect)?;
        let schema = source.inspect(args.get_str("table")?).await?;
        self.context.search.observe_schema(&schema);
        Ok(json!({
            "table": schema.table.to_string(),
            "columns": schema.columns,
        }))
    }
}
