//! The session-scoped, immutable set of connected sources.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use super::{
    mask_url_password, ApiSource, DataSource, Database, DriverRegistry, Library, SourceKind,
    TableFilter,
};
use crate::config::{QuarryConfig, SourceConfig};
use crate::error::{QuarryError, Result};

/// Ordered, read-only collection of sources, shared by `Arc`.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn DataSource>>,
}

impl SourceRegistry {
    /// Build from already-constructed sources. Identities must be unique.
    pub fn new(sources: Vec<Arc<dyn DataSource>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source.identity().to_string()) {
                return Err(QuarryError::Configuration(format!(
                    "duplicate source identity '{}'",
                    source.identity()
                )));
            }
        }
        Ok(Self { sources })
    }

    /// Connect every configured source.
    ///
    /// Sources that fail to connect stay registered as unreachable; only
    /// malformed configuration is an error.
    pub async fn from_config(config: &QuarryConfig, drivers: &DriverRegistry) -> Result<Self> {
        let mut sources: Vec<Arc<dyn DataSource>> = Vec::with_capacity(config.sources.len());
        for source in &config.sources {
            sources.push(build_source(source, config.data.max_rows, drivers).await?);
        }
        let registry = Self::new(sources)?;
        info!(sources = registry.len(), "source registry ready");
        Ok(registry)
    }

    /// Look up a source by identity.
    pub fn get(&self, identity: &str) -> Result<Arc<dyn DataSource>> {
        self.sources
            .iter()
            .find(|s| s.identity() == identity)
            .cloned()
            .ok_or_else(|| {
                QuarryError::InvalidArgument(format!(
                    "unknown source '{identity}'; available: {}",
                    self.identities().join(", ")
                ))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DataSource>> {
        self.sources.iter()
    }

    pub fn identities(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.identity()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.identities())
            .finish()
    }
}

/// Identity of a configured source: its name, or the URL with the password masked.
pub fn source_identity(config: &SourceConfig) -> String {
    config
        .name
        .clone()
        .unwrap_or_else(|| mask_url_password(&config.url))
}

async fn build_source(
    config: &SourceConfig,
    max_rows: usize,
    drivers: &DriverRegistry,
) -> Result<Arc<dyn DataSource>> {
    let identity = source_identity(config);
    let kind = SourceKind::from_url(&config.url);
    if kind != SourceKind::Database && (config.tables.is_some() || config.tables_pattern.is_some())
    {
        return Err(QuarryError::Configuration(format!(
            "table filters apply to databases only ('{identity}' is {kind})"
        )));
    }
    let source: Arc<dyn DataSource> = match kind {
        SourceKind::Database => {
            let filter = TableFilter::from_config(
                config.tables.as_deref(),
                config.tables_pattern.as_deref(),
            )?;
            Arc::new(Database::connect(identity, &config.url, drivers, filter, max_rows).await)
        }
        SourceKind::Api => Arc::new(
            ApiSource::load(
                identity,
                &config.url,
                config.headers.clone(),
                config.params.clone(),
                max_rows,
            )
            .await,
        ),
        SourceKind::Library => Arc::new(Library::from_url(identity, &config.url, max_rows)?),
    };
    Ok(source)
}
