use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::QueryContext;
use crate::error::QuarryError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

/// Lists usable sources with their tables; unreachable ones are reported apart.
pub struct DiscoverTool {
    context: Arc<QueryContext>,
    parameters: AgentToolParameters,
}

impl DiscoverTool {
    pub fn new(context: Arc<QueryContext>) -> Self {
        Self {
            context,
            parameters: AgentToolParameters::empty(),
        }
    }
}

#[async_trait]
impl Tool for DiscoverTool {
    fn name(&self) -> &str {
        "discover"
    }

    fn description(&self) -> &str {
        "List every connected source with its kind and tables (database tables, \
         API endpoints as 'METHOD /path', or library documents). Call this first."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        _args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<Value, QuarryError> {
        let mut usable = Vec::new();
        let mut unreachable = Vec::new();

        for source in self.context.sources.iter() {
            let identity = source.identity();
            let kind = source.kind().to_string();
            if !source.test().await {
                unreachable.push(json!({ "source": identity, "kind": kind, "reason": "connection test failed" }));
                continue;
            }
            match source.discover().await {
                Ok(tables) => {
                    if self.context.search.observe_tables(identity, &tables) {
                        debug!(source = identity, "search index invalidated by discover");
                    }
                    let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
                    usable.push(json!({ "source": identity, "kind": kind, "tables": names }));
                }
                Err(e) => {
                    unreachable.push(json!({ "source": identity, "kind": kind, "reason": e.to_string() }));
                }
            }
        }

        Ok(json!({ "sources": usable, "unreachable": unreachable }))
    }
}
