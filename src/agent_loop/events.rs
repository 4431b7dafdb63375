//! Session event stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{SessionId, SessionState};
use crate::types::AgentToolCall;

/// Callback receiving session events.
pub type SessionEventSink = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Sequenced event emitted by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: SessionId,
    /// Monotonic per session, starting at 1.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: SessionEventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventPayload {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    ToolCallStarted {
        turn: usize,
        call: AgentToolCall,
    },
    ToolCallCompleted {
        turn: usize,
        call_id: String,
        name: String,
        is_error: bool,
    },
    FinalAnswer {
        turn: usize,
        text: String,
    },
}

pub(super) struct SessionEventEmitter {
    session_id: SessionId,
    seq: AtomicU64,
    sink: Option<SessionEventSink>,
}

impl SessionEventEmitter {
    pub(super) fn new(session_id: SessionId, sink: Option<SessionEventSink>) -> Self {
        Self {
            session_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(super) fn emit(&self, payload: SessionEventPayload) {
        let Some(sink) = &self.sink else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(SessionEvent {
            session_id: self.session_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
