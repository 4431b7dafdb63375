//! Core session types for the agent loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{QuarryError, Result};
use crate::types::{AgentToolCall, AgentToolResult, Usage};

/// Unique session identifier.
pub type SessionId = Uuid;

/// Session lifecycle state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Init,
    Proposing,
    Executing,
    Finalizing,
    Answered,
    Exhausted,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Answered | Self::Exhausted | Self::Failed)
    }
}

/// What the model proposed in one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedAction {
    ToolCall { call: AgentToolCall },
    Answer { text: String },
}

/// One entry of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTurn {
    /// 1-based.
    pub turn_number: usize,
    pub proposed_action: ProposedAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<AgentToolResult>,
    pub is_final: bool,
}

/// Everything a finished session produced.
#[derive(Debug)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub state: SessionState,
    /// The coerced answer, or the absence value of an exhausted session.
    pub value: Option<Value>,
    pub error: Option<QuarryError>,
    pub transcript: Vec<AgentTurn>,
    pub usage: Usage,
}

impl SessionOutcome {
    /// The final turn, if the session was answered.
    pub fn final_turn(&self) -> Option<&AgentTurn> {
        self.transcript.iter().find(|t| t.is_final)
    }

    /// Number of tool executions the session performed.
    pub fn tool_executions(&self) -> usize {
        self.transcript
            .iter()
            .filter(|t| t.tool_result.is_some())
            .count()
    }

    /// Collapse into the value handed to callers of `ask`.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value.unwrap_or(Value::Null)),
        }
    }
}
