//! Relational database sources over a pluggable driver.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    clamp_rows, readonly, Capability, Column, DataSource, Rows, Schema, SourceKind, TableRef,
};
use crate::error::{QuarryError, Result};

const CAPABILITIES: [Capability; 5] = [
    Capability::List,
    Capability::Inspect,
    Capability::Sample,
    Capability::Query,
    Capability::Search,
];

/// Diagnostic reported by a driver. Surfaced to the model verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct DriverError(pub String);

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An open connection to one database.
///
/// Drivers own dialect translation and credentials. They are never handed a
/// statement that failed read-only classification.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Fully qualified table names, e.g. `public.orders`.
    async fn list_tables(&self) -> std::result::Result<Vec<String>, DriverError>;

    async fn get_schema(&self, table: &str) -> std::result::Result<Vec<Column>, DriverError>;

    async fn sample_rows(&self, table: &str, n: usize) -> std::result::Result<Rows, DriverError>;

    async fn execute(&self, query: &str) -> std::result::Result<Rows, DriverError>;

    async fn test_connection(&self) -> bool;
}

/// Opens connections for a set of URL schemes.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// URL schemes this driver handles (e.g. `&["postgres", "postgresql"]`).
    fn schemes(&self) -> &[&str];

    async fn connect(&self, url: &str) -> std::result::Result<Arc<dyn DatabaseConnection>, DriverError>;
}

/// Drivers keyed by URL scheme.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver for all schemes it declares.
    pub fn register(&mut self, driver: Arc<dyn DriverFactory>) {
        for scheme in driver.schemes() {
            self.drivers.insert(scheme.to_ascii_lowercase(), driver.clone());
        }
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn DriverFactory>> {
        self.drivers.get(&scheme.to_ascii_lowercase()).cloned()
    }

    pub fn schemes(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut schemes = self.schemes();
        schemes.sort_unstable();
        f.debug_struct("DriverRegistry")
            .field("schemes", &schemes)
            .finish()
    }
}

/// Restriction on which tables of a database are visible.
#[derive(Debug, Clone, Default)]
pub enum TableFilter {
    #[default]
    All,
    List(Vec<String>),
    Pattern(Regex),
}

impl TableFilter {
    /// Build a filter from an allow-list or a regex, at most one of which may be set.
    pub fn from_config(tables: Option<&[String]>, pattern: Option<&str>) -> Result<Self> {
        match (tables, pattern) {
            (Some(_), Some(_)) => Err(QuarryError::Configuration(
                "tables and tables_pattern are mutually exclusive".into(),
            )),
            (Some(list), None) => Ok(Self::List(list.to_vec())),
            (None, Some(pattern)) => Regex::new(pattern).map(Self::Pattern).map_err(|e| {
                QuarryError::Configuration(format!("invalid tables_pattern '{pattern}': {e}"))
            }),
            (None, None) => Ok(Self::All),
        }
    }

    pub fn is_restricted(&self) -> bool {
        !matches!(self, Self::All)
    }

    pub fn allows(&self, table: &str) -> bool {
        match self {
            Self::All => true,
            Self::List(list) => list.iter().any(|t| t == table),
            Self::Pattern(re) => re.is_match(table),
        }
    }
}

/// A database source. A failed connect leaves it registered but unreachable.
pub struct Database {
    identity: String,
    connection: std::result::Result<Arc<dyn DatabaseConnection>, String>,
    filter: TableFilter,
    max_rows: usize,
}

impl Database {
    pub fn new(
        identity: impl Into<String>,
        connection: Arc<dyn DatabaseConnection>,
        filter: TableFilter,
        max_rows: usize,
    ) -> Self {
        Self {
            identity: identity.into(),
            connection: Ok(connection),
            filter,
            max_rows,
        }
    }

    /// A source whose connection could not be established.
    pub fn unreachable(identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            connection: Err(reason.into()),
            filter: TableFilter::All,
            max_rows: 1,
        }
    }

    /// Connect through the driver registered for the URL scheme.
    pub async fn connect(
        identity: impl Into<String>,
        url: &str,
        drivers: &DriverRegistry,
        filter: TableFilter,
        max_rows: usize,
    ) -> Self {
        let identity = identity.into();
        let scheme = url.split_once("://").map(|(s, _)| s).unwrap_or(url);
        let Some(driver) = drivers.get(scheme) else {
            warn!(source = %identity, scheme, "no database driver registered");
            return Self::unreachable(identity, format!("no driver for scheme '{scheme}'"));
        };
        match driver.connect(url).await {
            Ok(connection) => {
                debug!(source = %identity, "database connected");
                Self::new(identity, connection, filter, max_rows)
            }
            Err(e) => {
                warn!(source = %identity, error = %e, "database connect failed");
                Self::unreachable(identity, e.0)
            }
        }
    }

    fn conn(&self) -> Result<&Arc<dyn DatabaseConnection>> {
        self.connection
            .as_ref()
            .map_err(|reason| QuarryError::connection(&self.identity, reason.clone()))
    }

    fn backend(&self, error: DriverError) -> QuarryError {
        QuarryError::backend(&self.identity, error.0)
    }

    async fn visible_tables(&self) -> Result<Vec<String>> {
        let tables = self
            .conn()?
            .list_tables()
            .await
            .map_err(|e| self.backend(e))?;
        let visible: Vec<String> = tables
            .into_iter()
            .filter(|t| self.filter.allows(t))
            .collect();
        if visible.is_empty() && self.filter.is_restricted() {
            return Err(QuarryError::Configuration(format!(
                "table filter of '{}' matches no tables",
                self.identity
            )));
        }
        Ok(visible)
    }

    async fn require_table(&self, table: &str) -> Result<()> {
        if self.visible_tables().await?.iter().any(|t| t == table) {
            Ok(())
        } else {
            Err(QuarryError::not_found(&self.identity, table))
        }
    }
}

#[async_trait]
impl DataSource for Database {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Database
    }

    fn capabilities(&self) -> &[Capability] {
        &CAPABILITIES
    }

    async fn test(&self) -> bool {
        match &self.connection {
            Ok(conn) => conn.test_connection().await,
            Err(_) => false,
        }
    }

    async fn discover(&self) -> Result<Vec<TableRef>> {
        Ok(self
            .visible_tables()
            .await?
            .into_iter()
            .map(|t| TableRef::new(&self.identity, t))
            .collect())
    }

    async fn inspect(&self, table: &str) -> Result<Schema> {
        self.require_table(table).await?;
        let columns = self
            .conn()?
            .get_schema(table)
            .await
            .map_err(|e| self.backend(e))?;
        Ok(Schema {
            table: TableRef::new(&self.identity, table),
            columns,
        })
    }

    async fn sample(&self, table: &str, n: usize) -> Result<Rows> {
        self.require_table(table).await?;
        let n = clamp_rows(n, self.max_rows);
        let rows = self
            .conn()?
            .sample_rows(table, n)
            .await
            .map_err(|e| self.backend(e))?;
        Ok(rows.truncate_to(n))
    }

    async fn query(&self, statement: &str) -> Result<Rows> {
        readonly::ensure_read_only(statement)?;
        let conn = self.conn()?;
        debug!(source = %self.identity, "executing read-only statement");
        let rows = conn.execute(statement).await.map_err(|e| self.backend(e))?;
        Ok(rows.truncate_to(self.max_rows))
    }
}
