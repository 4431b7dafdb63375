//! The session state machine.
//!
//! `Init` checks every source and renders the instructions. The loop then
//! alternates `Proposing` (one provider call) with at most one `Executing`
//! step until the model answers, the turn budget runs out, or an error that
//! belongs to the caller ends the session.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{SessionEventEmitter, SessionEventPayload, SessionEventSink};
use super::limits::SessionLimits;
use super::prompt::{self, SourceSummary};
use super::types::{AgentTurn, ProposedAction, SessionId, SessionOutcome, SessionState};
use crate::datasource::SourceRegistry;
use crate::error::QuarryError;
use crate::output::TypeDescriptor;
use crate::provider::{ModelProvider, ProviderRequest};
use crate::tools::{ToolCatalog, ToolExecutionContext};
use crate::types::{AgentToolCall, AgentToolResult, ModelMessage, Usage};

/// Input of one session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub question: String,
    pub output_type: TypeDescriptor,
    pub context: Option<String>,
    pub cancel: CancellationToken,
}

impl SessionRequest {
    pub fn new(question: impl Into<String>, output_type: TypeDescriptor) -> Self {
        Self {
            question: question.into(),
            output_type,
            context: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Drives one session against a provider and a tool catalog.
pub struct SessionRunner {
    provider: Arc<dyn ModelProvider>,
    catalog: ToolCatalog,
    sources: Arc<SourceRegistry>,
    limits: SessionLimits,
    event_sink: Option<SessionEventSink>,
}

enum Step {
    Continue,
    Finish,
}

struct Session<'a> {
    id: SessionId,
    request: &'a SessionRequest,
    state: SessionState,
    messages: Vec<ModelMessage>,
    transcript: Vec<AgentTurn>,
    usage: Usage,
    turn: usize,
    output_retries_left: usize,
    value: Option<Value>,
    error: Option<QuarryError>,
    emitter: SessionEventEmitter,
}

impl Session<'_> {
    fn transition(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        debug!(session = %self.id, from = %self.state, %to, "session state");
        self.emitter.emit(SessionEventPayload::StateChanged {
            from: self.state,
            to,
        });
        self.state = to;
    }

    fn fail(&mut self, error: QuarryError) -> Step {
        warn!(session = %self.id, turn = self.turn, error = %error, "session failed");
        self.error = Some(error);
        self.transition(SessionState::Failed);
        Step::Finish
    }
}

impl SessionRunner {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        catalog: ToolCatalog,
        sources: Arc<SourceRegistry>,
        limits: SessionLimits,
    ) -> Self {
        Self {
            provider,
            catalog,
            sources,
            limits,
            event_sink: None,
        }
    }

    pub fn with_event_sink(mut self, sink: SessionEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Run a session to a terminal state. Failures are reported in the outcome.
    pub async fn run(&self, request: &SessionRequest) -> SessionOutcome {
        let id = Uuid::new_v4();
        let mut session = Session {
            id,
            request,
            state: SessionState::Init,
            messages: Vec::new(),
            transcript: Vec::new(),
            usage: Usage::default(),
            turn: 0,
            output_retries_left: self.limits.max_output_retries,
            value: None,
            error: None,
            emitter: SessionEventEmitter::new(id, self.event_sink.clone()),
        };
        info!(
            session = %id,
            provider = self.provider.provider_name(),
            model = self.provider.model_id(),
            max_turns = self.limits.max_turns,
            "session started"
        );

        if let Step::Continue = self.init(&mut session).await {
            while let Step::Continue = self.propose(&mut session).await {}
        }

        info!(
            session = %id,
            state = %session.state,
            turns = session.turn,
            "session finished"
        );
        SessionOutcome {
            session_id: id,
            state: session.state,
            value: session.value,
            error: session.error,
            transcript: session.transcript,
            usage: session.usage,
        }
    }

    async fn init(&self, session: &mut Session<'_>) -> Step {
        let checks = self.sources.iter().map(|source| async move {
            let reachable = source.test().await;
            SourceSummary {
                name: source.identity().to_string(),
                kind: source.kind(),
                reachable,
            }
        });
        let summaries = join_all(checks).await;
        for summary in summaries.iter().filter(|s| !s.reachable) {
            warn!(session = %session.id, source = %summary.name, "source unreachable");
        }
        if !summaries.is_empty() && summaries.iter().all(|s| !s.reachable) {
            return session.fail(QuarryError::connection(
                self.sources.identities().join(", "),
                "every configured source is unreachable",
            ));
        }

        let instructions = match prompt::instructions(
            &self.catalog,
            &summaries,
            session.request.context.as_deref(),
            &session.request.output_type,
        ) {
            Ok(text) => text,
            Err(e) => return session.fail(e),
        };
        session.messages.push(ModelMessage::system(instructions));
        session
            .messages
            .push(ModelMessage::user(session.request.question.clone()));
        Step::Continue
    }

    async fn propose(&self, session: &mut Session<'_>) -> Step {
        session.transition(SessionState::Proposing);
        if session.request.cancel.is_cancelled() {
            return session.fail(QuarryError::Cancelled);
        }
        if session.turn >= self.limits.max_turns {
            info!(session = %session.id, turns = session.turn, "turn budget exhausted");
            match session.request.output_type.exhausted() {
                Ok(value) => session.value = Some(value),
                Err(e) => session.error = Some(e),
            }
            session.transition(SessionState::Exhausted);
            return Step::Finish;
        }
        session.turn += 1;

        let provider_request = ProviderRequest {
            messages: session.messages.clone(),
            tools: self.catalog.definitions(),
        };
        let response = match self.provider.propose(&provider_request).await {
            Ok(response) => response,
            Err(e) => return session.fail(e),
        };
        session.usage.merge(&response.usage);

        match response.tool_calls.first() {
            Some(first) => {
                if response.tool_calls.len() > 1 {
                    warn!(
                        session = %session.id,
                        turn = session.turn,
                        ignored = response.tool_calls.len() - 1,
                        "model proposed several tool calls; only the first is executed"
                    );
                }
                let mut call = first.clone();
                if call.id.trim().is_empty() {
                    call.id = format!("call_{}", Uuid::new_v4().simple());
                }
                self.execute(session, call).await
            }
            None => self.finalize(session, response.text),
        }
    }

    async fn execute(&self, session: &mut Session<'_>, call: AgentToolCall) -> Step {
        session.transition(SessionState::Executing);
        session
            .messages
            .push(ModelMessage::assistant_tool_call(call.clone()));
        session.emitter.emit(SessionEventPayload::ToolCallStarted {
            turn: session.turn,
            call: call.clone(),
        });

        let ctx = ToolExecutionContext {
            session_id: Some(session.id.to_string()),
            tool_call_id: Some(call.id.clone()),
            turn: session.turn,
        };
        let (result, is_error) = match self.catalog.execute(&call, &ctx).await {
            Ok(value) => (value, false),
            Err(e) if e.is_tool_recoverable() => {
                debug!(session = %session.id, tool = %call.name, error = %e, "tool error fed back");
                (json!({ "error": format!("{}: {e}", e.kind()) }), true)
            }
            Err(e) => return session.fail(e),
        };

        session.emitter.emit(SessionEventPayload::ToolCallCompleted {
            turn: session.turn,
            call_id: call.id.clone(),
            name: call.name.clone(),
            is_error,
        });
        session
            .messages
            .push(ModelMessage::tool_result(call.id.clone(), result.clone(), is_error));
        session.transcript.push(AgentTurn {
            turn_number: session.turn,
            proposed_action: ProposedAction::ToolCall { call: call.clone() },
            tool_result: Some(AgentToolResult {
                tool_call_id: call.id,
                result,
                is_error,
            }),
            is_final: false,
        });
        Step::Continue
    }

    fn finalize(&self, session: &mut Session<'_>, text: String) -> Step {
        session.transition(SessionState::Finalizing);
        session.messages.push(ModelMessage::assistant(text.clone()));

        match session.request.output_type.coerce(&text) {
            Ok(value) => {
                session.emitter.emit(SessionEventPayload::FinalAnswer {
                    turn: session.turn,
                    text: text.clone(),
                });
                session.transcript.push(AgentTurn {
                    turn_number: session.turn,
                    proposed_action: ProposedAction::Answer { text },
                    tool_result: None,
                    is_final: true,
                });
                session.value = Some(value);
                session.transition(SessionState::Answered);
                Step::Finish
            }
            Err(e) => {
                session.transcript.push(AgentTurn {
                    turn_number: session.turn,
                    proposed_action: ProposedAction::Answer { text },
                    tool_result: None,
                    is_final: false,
                });
                if session.output_retries_left > 0 && session.turn < self.limits.max_turns {
                    session.output_retries_left -= 1;
                    debug!(
                        session = %session.id,
                        retries_left = session.output_retries_left,
                        error = %e,
                        "answer rejected; asking again"
                    );
                    session.messages.push(ModelMessage::user(format!(
                        "Your answer could not be used ({e}). Reply again with JSON matching \
                         the answer schema of type {}.",
                        session.request.output_type
                    )));
                    Step::Continue
                } else {
                    session.fail(e)
                }
            }
        }
    }
}

impl std::fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRunner")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .field("catalog", &self.catalog)
            .field("sources", &self.sources)
            .field("limits", &self.limits)
            .finish()
    }
}
