//! Convenience re-exports for common use.

pub use crate::agent_loop::{SessionOutcome, SessionState};
pub use crate::config::{QuarryConfig, SourceConfig};
pub use crate::datasource::{DataSource, Rows, Schema, SourceKind, TableRef};
pub use crate::error::{QuarryError, Result};
pub use crate::models::LanguageModel;
pub use crate::output::{Field, TypeDescriptor};
pub use crate::provider::ModelProvider;
pub use crate::quarry::{AskRequest, Quarry};
pub use crate::search::SearchStrategy;
pub use crate::tools::{AgentToolParameters, Tool, ToolArguments};
pub use crate::types::{ModelMessage, Role, Usage};
