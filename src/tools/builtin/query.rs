use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::QueryContext;
use crate::datasource::{readonly, Capability, SourceKind};
use crate::error::QuarryError;
use crate::learning::QueryRecord;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

/// Read-only statement execution.
///
/// Database statements are classified before the source is touched. Every
/// executed statement is reported to the learning collaborator when one is
/// configured.
pub struct QueryTool {
    context: Arc<QueryContext>,
    parameters: AgentToolParameters,
}

impl QueryTool {
    pub fn new(context: Arc<QueryContext>) -> Self {
        Self {
            context,
            parameters: AgentToolParameters::object()
                .string("source", "Identity of the source.", true)
                .string(
                    "statement",
                    "A read-only SQL statement, or 'METHOD /path?query' for API sources.",
                    true,
                )
                .string("description", "What the statement is meant to find.", false)
                .build(),
        }
    }

    fn record(
        &self,
        source_kind: SourceKind,
        statement: &str,
        description: Option<&str>,
        outcome: &Result<Value, QuarryError>,
    ) {
        let Some(learning) = self.context.learning.clone() else {
            return;
        };
        let entry = QueryRecord {
            statement: statement.to_string(),
            description: description.map(str::to_string),
            success: outcome.is_ok(),
            error_message: outcome.as_ref().err().map(|e| e.to_string()),
            dialect: source_kind.to_string(),
        };
        tokio::spawn(async move {
            if let Err(e) = learning.record(&entry).await {
                warn!(error = %e, "failed to record query");
            }
        });
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "query"
    }

    fn description(&self) -> &str {
        "Run a read-only statement against a source. Only SELECT-style SQL (or GET, HEAD and \
         OPTIONS requests for APIs) is allowed; anything that modifies data is rejected."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<Value, QuarryError> {
        let source = self.context.source(args, Capability::Query)?;
        let statement = args.get_str("statement")?;
        let description = args.get_str_opt("description");

        if source.kind() == SourceKind::Database {
            readonly::ensure_read_only(statement)?;
        }

        debug!(source = source.identity(), turn = ctx.turn, "running query");
        let outcome = source
            .query(statement)
            .await
            .map(|rows| json!({ "source": source.identity(), "rows": rows }));
        self.record(source.kind(), statement, description, &outcome);
        outcome
    }
}
