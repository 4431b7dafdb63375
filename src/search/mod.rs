//! Ranking tables across sources for the `scan` tool.
//!
//! Three mutually exclusive strategies: regex over qualified names, fuzzy
//! edit-distance similarity, and TF-IDF cosine similarity over name tokens
//! plus any column names seen by `inspect`. The per-source index is built
//! lazily on the first scan of a source and rebuilt from scratch when the
//! source's table list changes.

pub mod fuzzy;
pub mod regex;
pub mod tfidf;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::datasource::{DataSource, Schema, SourceRegistry, TableRef};
use crate::error::Result;

pub use self::regex::RegexQuery;
pub use self::tfidf::TfIdfIndex;

/// Default number of hits returned by one scan.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchStrategy {
    Regex,
    Fuzzy,
    #[default]
    Tfidf,
}

/// One ranked table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(serialize_with = "display_table")]
    pub table: TableRef,
    pub score: f64,
}

fn display_table<S: Serializer>(table: &TableRef, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(table)
}

/// Lowercased tokens split on `/`, `.`, `_`, `-` and whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| matches!(c, '/' | '.' | '_' | '-') || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Everything known about one source's tables.
#[derive(Debug, Clone)]
pub struct SourceIndex {
    tables: Vec<TableRef>,
    columns: HashMap<String, Vec<String>>,
    tfidf: TfIdfIndex,
}

impl SourceIndex {
    pub fn new(tables: Vec<TableRef>) -> Self {
        Self::with_columns(tables, HashMap::new())
    }

    fn with_columns(tables: Vec<TableRef>, columns: HashMap<String, Vec<String>>) -> Self {
        let documents: Vec<(TableRef, Vec<String>)> = tables
            .iter()
            .map(|table| {
                let mut tokens = tokenize(&table.qualified_name);
                if let Some(cols) = columns.get(&table.qualified_name) {
                    tokens.extend(cols.iter().flat_map(|c| tokenize(c)));
                }
                (table.clone(), tokens)
            })
            .collect();
        let tfidf = TfIdfIndex::build(&documents);
        Self {
            tables,
            columns,
            tfidf,
        }
    }

    pub fn tables(&self) -> &[TableRef] {
        &self.tables
    }

    fn rank(&self, query: &str, strategy: SearchStrategy, regex: Option<&RegexQuery>) -> Vec<SearchHit> {
        match (strategy, regex) {
            (SearchStrategy::Regex, Some(regex)) => regex.rank(&self.tables),
            (SearchStrategy::Regex, None) => Vec::new(),
            (SearchStrategy::Fuzzy, _) => fuzzy::rank(query, &self.tables),
            (SearchStrategy::Tfidf, _) => self.tfidf.rank(query),
        }
    }
}

/// Per-session search state.
#[derive(Debug)]
pub struct SearchEngine {
    limit: usize,
    index: Mutex<HashMap<String, Arc<SourceIndex>>>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_LIMIT)
    }
}

impl SearchEngine {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<SourceIndex>>> {
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether `identity` currently has a built index.
    pub fn is_indexed(&self, identity: &str) -> bool {
        self.lock().contains_key(identity)
    }

    /// Rank tables of one source, or of every reachable source.
    ///
    /// An invalid regex fails before any source is touched. When scanning all
    /// sources, sources that cannot be listed are skipped.
    pub async fn scan(
        &self,
        registry: &SourceRegistry,
        source: Option<&str>,
        query: &str,
        strategy: SearchStrategy,
    ) -> Result<Vec<SearchHit>> {
        let regex = match strategy {
            SearchStrategy::Regex => Some(RegexQuery::compile(query)?),
            _ => None,
        };

        let mut hits = match source {
            Some(identity) => {
                let source = registry.get(identity)?;
                let index = self.source_index(source.as_ref()).await?;
                index.rank(query, strategy, regex.as_ref())
            }
            None => {
                let mut merged = Vec::new();
                for source in registry.iter() {
                    match self.source_index(source.as_ref()).await {
                        Ok(index) => merged.extend(index.rank(query, strategy, regex.as_ref())),
                        Err(e) => {
                            debug!(source = source.identity(), error = %e, "skipping source in scan");
                        }
                    }
                }
                merged.sort_by(|a, b| {
                    b.score
                        .total_cmp(&a.score)
                        .then_with(|| a.table.to_string().cmp(&b.table.to_string()))
                });
                merged
            }
        };
        hits.truncate(self.limit);
        debug!(%strategy, hits = hits.len(), "scan complete");
        Ok(hits)
    }

    /// Record a fresh table listing; drops the index when the listing changed.
    ///
    /// Returns true when an index was invalidated.
    pub fn observe_tables(&self, identity: &str, tables: &[TableRef]) -> bool {
        let mut index = self.lock();
        let changed = index
            .get(identity)
            .is_some_and(|existing| existing.tables.as_slice() != tables);
        if changed {
            index.remove(identity);
            debug!(source = identity, "table list changed; search index dropped");
        }
        changed
    }

    /// Fold inspected column names into the source's index.
    pub fn observe_schema(&self, schema: &Schema) {
        let mut index = self.lock();
        let identity = &schema.table.source_identity;
        let Some(existing) = index.get(identity) else {
            return;
        };
        let names: Vec<String> = schema.column_names().map(str::to_string).collect();
        if existing.columns.get(&schema.table.qualified_name) == Some(&names) {
            return;
        }
        let mut columns = existing.columns.clone();
        columns.insert(schema.table.qualified_name.clone(), names);
        let rebuilt = SourceIndex::with_columns(existing.tables.clone(), columns);
        index.insert(identity.clone(), Arc::new(rebuilt));
    }

    async fn source_index(&self, source: &dyn DataSource) -> Result<Arc<SourceIndex>> {
        let cached = self.lock().get(source.identity()).cloned();
        if let Some(existing) = cached {
            return Ok(existing);
        }
        let tables = source.discover().await?;
        debug!(source = source.identity(), tables = tables.len(), "building search index");
        let built = Arc::new(SourceIndex::new(tables));
        let mut index = self.lock();
        Ok(index
            .entry(source.identity().to_string())
            .or_insert(built)
            .clone())
    }
}
