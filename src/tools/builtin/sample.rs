use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::QueryContext;
use crate::datasource::Capability;
use crate::error::QuarryError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

pub struct SampleTool {
    context: Arc<QueryContext>,
    parameters: AgentToolParameters,
}

impl SampleTool {
    pub fn new(context: Arc<QueryContext>) -> Self {
        let n_description = format!(
            "Number of rows (default {}, at most {}).",
            context.data.default_sample_rows, context.data.max_rows
        );
        Self {
            parameters: AgentToolParameters::object()
                .string("source", "Identity of the source.", true)
                .string("table", "Qualified table name, API GET endpoint or document path.", true)
                .integer("n", n_description, false)
                .integer(
                    "offset",
                    "Rows to skip before sampling (default 0). Documents use this to read past their first page.",
                    false,
                )
                .build(),
            context,
        }
    }
}

#[async_trait]
impl Tool for SampleTool {
    fn name(&self) -> &str {
        "sample"
    }

    fn description(&self) -> &str {
        "Fetch a few rows of a table to see real values, or read a document page by page \
         (follow the offset given in the result's message to continue)."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<Value, QuarryError> {
        let offset = args.get_usize_opt("offset")?.unwrap_or(0);
        let capability = if offset > 0 {
            Capability::Paginate
        } else {
            Capability::Sample
        };
        let source = self.context.source(args, capability)?;
        let table = args.get_str("table")?;
        let n = args
            .get_usize_opt("n")?
            .unwrap_or(self.context.data.default_sample_rows);
        let rows = source.sample_at(table, offset, n).await?;
        Ok(json!({
            "table": format!("{}.{table}", source.identity()),
            "rows": rows,
        }))
    }
}
