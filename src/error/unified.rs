//! Error classification and propagation policy.

use serde::{Deserialize, Serialize};

/// Broad error category for routing propagation logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Connection,
    InvalidQuery,
    NotFound,
    ReadOnly,
    Backend,
    Authentication,
    Degraded,
    Validation,
    Cancelled,
    Provider,
    Network,
    Usage,
    Unknown,
}

/// Where an error raised inside a session ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Appended to the transcript as information; the model decides what to do next.
    Transcript,
    /// Ends the session and is returned to the caller.
    Caller,
}

impl ErrorCategory {
    pub fn propagation(self) -> Propagation {
        match self {
            Self::Configuration
            | Self::InvalidQuery
            | Self::NotFound
            | Self::ReadOnly
            | Self::Backend
            | Self::Connection
            | Self::Authentication
            | Self::Degraded
            | Self::Usage
            | Self::Network
            | Self::Unknown => Propagation::Transcript,
            Self::Validation | Self::Cancelled | Self::Provider => Propagation::Caller,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration_error",
            Self::Connection => "connection_error",
            Self::InvalidQuery => "invalid_query",
            Self::NotFound => "not_found",
            Self::ReadOnly => "read_only_violation",
            Self::Backend => "backend_error",
            Self::Authentication => "auth_error",
            Self::Degraded => "degraded",
            Self::Validation => "validation_error",
            Self::Cancelled => "cancelled",
            Self::Provider => "provider_error",
            Self::Network => "network_error",
            Self::Usage => "usage_error",
            Self::Unknown => "error",
        }
    }
}
