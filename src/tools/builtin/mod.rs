//! The fixed, read-only tool catalog: `test`, `discover`, `scan`, `inspect`,
//! `sample`, `query` and `learn`.

mod discover;
mod inspect;
mod learn;
mod query;
mod sample;
mod scan;
mod test;

pub use discover::DiscoverTool;
pub use inspect::InspectTool;
pub use learn::LearnTool;
pub use query::QueryTool;
pub use sample::SampleTool;
pub use scan::ScanTool;
pub use test::TestTool;

use std::sync::Arc;

use crate::config::DataSettings;
use crate::datasource::{unsupported, Capability, DataSource, SourceRegistry};
use crate::error::Result;
use crate::learning::LearningCollaborator;
use crate::search::SearchEngine;

use super::{ToolArguments, ToolCatalog};

/// Per-session state shared by every built-in tool.
pub struct QueryContext {
    pub sources: Arc<SourceRegistry>,
    pub search: SearchEngine,
    pub learning: Option<Arc<dyn LearningCollaborator>>,
    pub data: DataSettings,
}

impl QueryContext {
    pub fn new(sources: Arc<SourceRegistry>, search: SearchEngine, data: DataSettings) -> Self {
        Self {
            sources,
            search,
            learning: None,
            data,
        }
    }

    pub fn with_learning(mut self, learning: Option<Arc<dyn LearningCollaborator>>) -> Self {
        self.learning = learning;
        self
    }

    /// Resolve the `source` argument, refusing sources that lack `capability`.
    fn source(&self, args: &ToolArguments, capability: Capability) -> Result<Arc<dyn DataSource>> {
        let source = self.sources.get(args.get_str("source")?)?;
        if !source.supports(capability) {
            return Err(unsupported(source.identity(), capability));
        }
        Ok(source)
    }
}

impl std::fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("sources", &self.sources)
            .field("search", &self.search)
            .field("learning", &self.learning.is_some())
            .field("data", &self.data)
            .finish()
    }
}

/// Build the catalog in its canonical order.
pub fn builtin_catalog(context: Arc<QueryContext>) -> ToolCatalog {
    ToolCatalog::new(vec![
        Arc::new(TestTool::new(context.clone())),
        Arc::new(DiscoverTool::new(context.clone())),
        Arc::new(ScanTool::new(context.clone())),
        Arc::new(InspectTool::new(context.clone())),
        Arc::new(SampleTool::new(context.clone())),
        Arc::new(QueryTool::new(context.clone())),
        Arc::new(LearnTool::new(context)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::Database;
    use crate::error::QuarryError;

    fn context() -> Arc<QueryContext> {
        let down: Arc<dyn DataSource> = Arc::new(Database::unreachable("A", "refused"));
        let sources = SourceRegistry::new(vec![down]).unwrap();
        Arc::new(QueryContext::new(
            Arc::new(sources),
            SearchEngine::default(),
            DataSettings::default(),
        ))
    }

    #[test]
    fn catalog_order_is_fixed() {
        let catalog = builtin_catalog(context());
        assert_eq!(
            catalog.names(),
            vec!["test", "discover", "scan", "inspect", "sample", "query", "learn"]
        );
        let defs = catalog.definitions();
        assert_eq!(defs[2].parameters["properties"]["strategy"]["enum"][2], "tfidf");
    }

    #[tokio::test]
    async fn test_tool_reports_unknown_sources_without_failing() {
        let catalog = builtin_catalog(context());
        let call = crate::types::AgentToolCall {
            id: "call_1".into(),
            name: "test".into(),
            arguments: serde_json::json!({"source": "missing"}),
        };
        let value = catalog
            .execute(&call, &crate::tools::ToolExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(value["reachable"], false);
        assert!(value["error"].as_str().unwrap().contains("available: A"));
    }

    #[tokio::test]
    async fn learn_without_service_is_an_authentication_error() {
        let catalog = builtin_catalog(context());
        let call = crate::types::AgentToolCall {
            id: "call_2".into(),
            name: "learn".into(),
            arguments: serde_json::json!({"question": "revenue by month"}),
        };
        let err = catalog
            .execute(&call, &crate::tools::ToolExecutionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QuarryError::Authentication(_)));
    }
}
