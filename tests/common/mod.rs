//! Shared test helpers: a scripted model provider and an in-memory database driver.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use quarry::config::DataSettings;
use quarry::datasource::{
    Column, DataSource, Database, DatabaseConnection, DriverError, DriverFactory, Rows,
    SourceRegistry, TableFilter,
};
use quarry::error::QuarryError;
use quarry::provider::{FinishReason, ModelProvider, ProviderRequest, ProviderResponse};
use quarry::search::SearchEngine;
use quarry::tools::{builtin_catalog, QueryContext, ToolCatalog};
use quarry::types::{AgentToolCall, Usage};

/// A provider that replays queued responses and records every request.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    fallback: Option<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Once the queue is empty, answer every request with `response`.
    pub fn repeating(response: ProviderResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn propose(&self, request: &ProviderRequest) -> Result<ProviderResponse, QuarryError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return Ok(next);
        }
        self.fallback.clone().ok_or_else(|| QuarryError::Provider {
            provider: "scripted".into(),
            message: "script exhausted".into(),
        })
    }
}

fn usage() -> Usage {
    Usage {
        input_tokens: 10,
        output_tokens: 5,
        total_tokens: 15,
    }
}

/// A response proposing one tool call.
pub fn tool_call(id: &str, name: &str, arguments: Value) -> ProviderResponse {
    ProviderResponse {
        text: String::new(),
        usage: usage(),
        tool_calls: vec![AgentToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }],
        finish_reason: Some(FinishReason::ToolCalls),
    }
}

/// A response proposing a final answer.
pub fn answer(text: &str) -> ProviderResponse {
    ProviderResponse {
        text: text.to_string(),
        usage: usage(),
        tool_calls: Vec::new(),
        finish_reason: Some(FinishReason::Stop),
    }
}

struct MemoryTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

/// An in-memory database that counts statement executions.
#[derive(Default)]
pub struct MemoryConnection {
    tables: Mutex<BTreeMap<String, MemoryTable>>,
    executions: AtomicUsize,
}

impl MemoryConnection {
    pub fn add_table(&self, name: &str, columns: Vec<Column>, rows: Vec<Vec<Value>>) {
        self.tables
            .lock()
            .unwrap()
            .insert(name.to_string(), MemoryTable { columns, rows });
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn list_tables(&self) -> Result<Vec<String>, DriverError> {
        Ok(self.tables.lock().unwrap().keys().cloned().collect())
    }

    async fn get_schema(&self, table: &str) -> Result<Vec<Column>, DriverError> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| DriverError::new(format!("relation \"{table}\" does not exist")))
    }

    async fn sample_rows(&self, table: &str, n: usize) -> Result<Rows, DriverError> {
        let tables = self.tables.lock().unwrap();
        let t = tables
            .get(table)
            .ok_or_else(|| DriverError::new(format!("relation \"{table}\" does not exist")))?;
        Ok(Rows::new(
            t.columns.iter().map(|c| c.column_name.clone()).collect(),
            t.rows.iter().take(n).cloned().collect(),
        ))
    }

    /// Returns every row of the first table whose short name appears after FROM.
    async fn execute(&self, query: &str) -> Result<Rows, DriverError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let lowered = query.to_lowercase();
        let target = lowered
            .split("from")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .map(|t| t.trim_end_matches(';').to_string())
            .ok_or_else(|| DriverError::new("syntax error: missing FROM clause"))?;
        let tables = self.tables.lock().unwrap();
        let found = tables.iter().find(|(name, _)| {
            name.as_str() == target || name.rsplit('.').next() == Some(target.as_str())
        });
        match found {
            Some((_, t)) => Ok(Rows::new(
                t.columns.iter().map(|c| c.column_name.clone()).collect(),
                t.rows.clone(),
            )),
            None => Err(DriverError::new(format!("relation \"{target}\" does not exist"))),
        }
    }

    async fn test_connection(&self) -> bool {
        true
    }
}

/// Hands out one shared connection for `memory://` URLs; `memory://down` fails.
pub struct MemoryDriver {
    pub connection: Arc<MemoryConnection>,
}

#[async_trait]
impl DriverFactory for MemoryDriver {
    fn schemes(&self) -> &[&str] {
        &["memory"]
    }

    async fn connect(&self, url: &str) -> Result<Arc<dyn DatabaseConnection>, DriverError> {
        if url.contains("down") {
            return Err(DriverError::new("connection refused"));
        }
        Ok(self.connection.clone())
    }
}

/// `public.orders` (3 rows) and `public.customers` (2 rows).
pub fn shop_connection() -> Arc<MemoryConnection> {
    let conn = Arc::new(MemoryConnection::default());
    conn.add_table(
        "public.orders",
        vec![
            Column::new("id", "integer").key(),
            Column::new("customer_id", "integer"),
            Column::new("total", "numeric"),
        ],
        vec![
            vec![json!(1), json!(1), json!(19.5)],
            vec![json!(2), json!(2), json!(5.0)],
            vec![json!(3), json!(1), json!(42.0)],
        ],
    );
    conn.add_table(
        "public.customers",
        vec![
            Column::new("id", "integer").key(),
            Column::new("name", "text"),
        ],
        vec![vec![json!(1), json!("Ada")], vec![json!(2), json!("Grace")]],
    );
    conn
}

pub fn shop_database(identity: &str, conn: Arc<MemoryConnection>) -> Arc<dyn DataSource> {
    Arc::new(Database::new(identity, conn, TableFilter::All, 100))
}

pub fn down_database(identity: &str) -> Arc<dyn DataSource> {
    Arc::new(Database::unreachable(identity, "connection refused"))
}

pub fn registry(sources: Vec<Arc<dyn DataSource>>) -> Arc<SourceRegistry> {
    Arc::new(SourceRegistry::new(sources).unwrap())
}

pub fn context(sources: Arc<SourceRegistry>) -> QueryContext {
    QueryContext::new(sources, SearchEngine::default(), DataSettings::default())
}

pub fn catalog(sources: Arc<SourceRegistry>) -> ToolCatalog {
    builtin_catalog(Arc::new(context(sources)))
}

pub fn call(name: &str, arguments: Value) -> AgentToolCall {
    AgentToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments,
    }
}
