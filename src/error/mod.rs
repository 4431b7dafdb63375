//! Error types for Quarry.

pub mod unified;

pub use unified::{ErrorCategory, Propagation};

use thiserror::Error;

/// Primary error type for all Quarry operations.
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {source_id}: {message}")]
    Connection { source_id: String, message: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Not found: {table} in {source_id}")]
    NotFound { source_id: String, table: String },

    #[error("Read-only violation: {0}")]
    ReadOnlyViolation(String),

    #[error("Backend error: {source_id}: {message}")]
    Backend { source_id: String, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Degraded: {0}")]
    Degraded(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl QuarryError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a backend error carrying the driver's diagnostic verbatim.
    pub fn backend(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a connection error for a source.
    pub fn connection(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error for a table of a source.
    pub fn not_found(source_id: impl Into<String>, table: impl Into<String>) -> Self {
        Self::NotFound {
            source_id: source_id.into(),
            table: table.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::InvalidQuery(_) => ErrorCategory::InvalidQuery,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::ReadOnlyViolation(_) => ErrorCategory::ReadOnly,
            Self::Backend { .. } => ErrorCategory::Backend,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Degraded(_) => ErrorCategory::Degraded,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Provider { .. } | Self::RateLimited { .. } => ErrorCategory::Provider,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                _ => ErrorCategory::Provider,
            },
            Self::Network(_) => ErrorCategory::Network,
            Self::UnsupportedOperation(_) | Self::InvalidArgument(_) => ErrorCategory::Usage,
            Self::Io(_) | Self::Serialization(_) | Self::Yaml(_) => ErrorCategory::Unknown,
        }
    }

    /// How this error travels when raised by a tool during a session.
    pub fn propagation(&self) -> Propagation {
        self.category().propagation()
    }

    /// Whether the loop feeds this error back to the model instead of aborting.
    pub fn is_tool_recoverable(&self) -> bool {
        matches!(self.propagation(), Propagation::Transcript)
    }

    /// Short machine-readable kind, used as the prefix of transcript error text.
    pub fn kind(&self) -> &'static str {
        self.category().as_str()
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, QuarryError>;
