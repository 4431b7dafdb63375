use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use strum::VariantNames;

use super::QueryContext;
use crate::error::QuarryError;
use crate::search::SearchStrategy;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

/// Ranked table search across one or all sources.
pub struct ScanTool {
    context: Arc<QueryContext>,
    parameters: AgentToolParameters,
}

impl ScanTool {
    pub fn new(context: Arc<QueryContext>) -> Self {
        Self {
            context,
            parameters: AgentToolParameters::object()
                .string("source", "Source to search. Omit to search all sources.", false)
                .string("query", "Search text, or a regular expression for the regex strategy.", true)
                .string_enum(
                    "strategy",
                    "regex: pattern over qualified names; fuzzy: tolerant of typos; \
                     tfidf: keyword relevance over names and known columns (default).",
                    SearchStrategy::VARIANTS,
                    false,
                )
                .build(),
        }
    }
}

#[async_trait]
impl Tool for ScanTool {
    fn name(&self) -> &str {
        "scan"
    }

    fn description(&self) -> &str {
        "Find tables, endpoints or documents relevant to a topic. An empty result is \
         an answer too: try another strategy or wording."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<Value, QuarryError> {
        let source = args.get_str_opt("source");
        let query = args.get_str("query")?;
        let strategy = match args.get_str_opt("strategy") {
            Some(raw) => SearchStrategy::from_str(raw)
                .map_err(|_| QuarryError::InvalidArgument(format!("unknown strategy '{raw}'")))?,
            None => SearchStrategy::default(),
        };
        let hits = self
            .context
            .search
            .scan(&self.context.sources, source, query, strategy)
            .await?;
        Ok(json!({
            "strategy": strategy.to_string(),
            "results": hits,
        }))
    }
}
