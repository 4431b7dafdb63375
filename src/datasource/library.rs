//! Directories of documents.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use ignore::WalkBuilder;
use serde_json::json;

use super::{clamp_rows, Capability, Column, DataSource, Rows, Schema, SourceKind, TableRef};
use crate::error::{QuarryError, Result};

const CAPABILITIES: [Capability; 5] = [
    Capability::List,
    Capability::Inspect,
    Capability::Sample,
    Capability::Search,
    Capability::Paginate,
];

/// A `file://` directory whose documents are exposed as tables of lines.
///
/// Documents are read in pages of at most `max_rows` lines; `sample_at`
/// continues from any line offset.
pub struct Library {
    identity: String,
    root: PathBuf,
    max_rows: usize,
}

impl Library {
    pub fn new(identity: impl Into<String>, root: impl Into<PathBuf>, max_rows: usize) -> Self {
        Self {
            identity: identity.into(),
            root: root.into(),
            max_rows,
        }
    }

    /// Build from a `file://` URL.
    pub fn from_url(identity: impl Into<String>, url: &str, max_rows: usize) -> Result<Self> {
        let root = url::Url::parse(url)
            .ok()
            .filter(|u| u.scheme() == "file")
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| {
                QuarryError::Configuration(format!("libraries need a file:// URL, got '{url}'"))
            })?;
        Ok(Self::new(identity, root, max_rows))
    }

    async fn documents(&self) -> Result<Vec<String>> {
        let identity = self.identity.clone();
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || walk(&identity, &root))
            .await
            .map_err(|e| QuarryError::backend(&self.identity, format!("document walk failed: {e}")))?
    }

    /// Resolve a relative document path. Anything that lands outside the
    /// root, including through symlinks, is not found.
    async fn resolve(&self, document: &str) -> Result<PathBuf> {
        let relative = Path::new(document);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(QuarryError::not_found(&self.identity, document));
        }
        let root = tokio::fs::canonicalize(&self.root).await.map_err(|e| {
            QuarryError::connection(
                &self.identity,
                format!("library path {} is unavailable: {e}", self.root.display()),
            )
        })?;
        let path = tokio::fs::canonicalize(root.join(relative))
            .await
            .map_err(|_| QuarryError::not_found(&self.identity, document))?;
        let is_file = tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file());
        if !is_file || !path.starts_with(&root) {
            return Err(QuarryError::not_found(&self.identity, document));
        }
        Ok(path)
    }
}

fn walk(identity: &str, root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(QuarryError::connection(
            identity,
            format!("library path does not exist: {}", root.display()),
        ));
    }
    let mut builder = WalkBuilder::new(root);
    builder.hidden(true);
    builder.parents(false);
    builder.git_ignore(true);
    builder.sort_by_file_name(|a, b| a.cmp(b));

    let mut docs = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(source = %identity, error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            docs.push(relative_name(relative));
        }
    }
    Ok(docs)
}

fn relative_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl DataSource for Library {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Library
    }

    fn capabilities(&self) -> &[Capability] {
        &CAPABILITIES
    }

    async fn test(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .is_ok_and(|meta| meta.is_dir())
    }

    async fn discover(&self) -> Result<Vec<TableRef>> {
        Ok(self
            .documents()
            .await?
            .into_iter()
            .map(|doc| TableRef::new(&self.identity, doc))
            .collect())
    }

    async fn inspect(&self, table: &str) -> Result<Schema> {
        self.resolve(table).await?;
        Ok(Schema {
            table: TableRef::new(&self.identity, table),
            columns: vec![
                Column::new("line_number", "integer").key(),
                Column::new("content", "text"),
            ],
        })
    }

    async fn sample(&self, table: &str, n: usize) -> Result<Rows> {
        self.sample_at(table, 0, n).await
    }

    async fn sample_at(&self, table: &str, offset: usize, n: usize) -> Result<Rows> {
        let path = self.resolve(table).await?;
        let n = clamp_rows(n, self.max_rows);
        let bytes = tokio::fs::read(&path).await?;
        let text = String::from_utf8_lossy(&bytes);
        let total = text.lines().count();
        let rows: Vec<_> = text
            .lines()
            .enumerate()
            .skip(offset)
            .take(n)
            .map(|(i, line)| vec![json!(i + 1), json!(line)])
            .collect();

        let end = offset + rows.len();
        let mut page = Rows::new(vec!["line_number".into(), "content".into()], rows);
        page.row_count = total;
        if offset >= total && total > 0 {
            page.message = Some(format!(
                "offset {offset} is past the end of {table} ({total} lines)"
            ));
        } else if end < total {
            page.truncated = true;
            page.message = Some(format!(
                "Showing lines {}-{end} of {total}; sample again with offset={end} to continue",
                offset + 1
            ));
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> (tempfile::TempDir, Library) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("reports")).unwrap();
        std::fs::write(dir.path().join("readme.md"), "# Sales\nline two\nline three\n").unwrap();
        std::fs::write(dir.path().join("reports/q1.txt"), "revenue 10\n").unwrap();
        let lib = Library::new("docs", dir.path(), 100);
        (dir, lib)
    }

    #[tokio::test]
    async fn documents_are_relative_paths() {
        let (_dir, lib) = library();
        let names: Vec<String> = lib
            .discover()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.qualified_name)
            .collect();
        assert_eq!(names, vec!["readme.md", "reports/q1.txt"]);
    }

    #[tokio::test]
    async fn sample_returns_leading_lines() {
        let (_dir, lib) = library();
        let rows = lib.sample("readme.md", 2).await.unwrap();
        assert_eq!(rows.rows.len(), 2);
        assert_eq!(rows.rows[1][1], "line two");
        assert!(rows.truncated);
        assert!(rows.message.unwrap().contains("offset=2"));
    }

    #[tokio::test]
    async fn pages_continue_past_the_row_limit() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (1..=250).map(|i| format!("line {i}\n")).collect();
        std::fs::write(dir.path().join("long.txt"), body).unwrap();
        let lib = Library::new("docs", dir.path(), 100);

        let first = lib.sample_at("long.txt", 0, 500).await.unwrap();
        assert_eq!(first.rows.len(), 100);
        assert_eq!(first.row_count, 250);
        assert!(first.message.as_deref().unwrap().contains("offset=100"));

        let second = lib.sample_at("long.txt", 100, 100).await.unwrap();
        assert_eq!(second.rows[0][0], 101);
        assert_eq!(second.rows[0][1], "line 101");
        assert!(second.truncated);
        assert!(second.message.as_deref().unwrap().contains("offset=200"));

        let last = lib.sample_at("long.txt", 200, 100).await.unwrap();
        assert_eq!(last.rows.len(), 50);
        assert_eq!(last.rows[49][1], "line 250");
        assert!(!last.truncated);
        assert_eq!(last.message, None);

        let beyond = lib.sample_at("long.txt", 300, 10).await.unwrap();
        assert!(beyond.rows.is_empty());
        assert!(beyond.message.unwrap().contains("past the end"));
    }

    #[tokio::test]
    async fn traversal_is_not_found() {
        let (_dir, lib) = library();
        assert!(matches!(
            lib.inspect("../etc/passwd").await,
            Err(QuarryError::NotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_out_of_the_root_are_not_found() {
        let (dir, lib) = library();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "hunter2\n").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            dir.path().join("leak.txt"),
        )
        .unwrap();

        assert!(matches!(
            lib.sample("leak.txt", 5).await,
            Err(QuarryError::NotFound { .. })
        ));
        let names: Vec<String> = lib
            .discover()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.qualified_name)
            .collect();
        assert!(!names.contains(&"leak.txt".to_string()));
    }

    #[tokio::test]
    async fn libraries_cannot_be_queried() {
        let (_dir, lib) = library();
        assert!(!lib.supports(Capability::Query));
        assert!(lib.supports(Capability::Paginate));
        assert!(matches!(
            lib.query("SELECT 1").await,
            Err(QuarryError::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn missing_root_is_unreachable() {
        let lib = Library::new("gone", "/definitely/not/here", 100);
        assert!(!lib.test().await);
        assert!(lib.discover().await.is_err());
    }
}
