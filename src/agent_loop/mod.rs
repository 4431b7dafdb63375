//! The bounded, tool-using session loop.

pub mod events;
pub mod limits;
pub mod prompt;
pub mod runner;
pub mod types;

pub use events::{SessionEvent, SessionEventPayload, SessionEventSink};
pub use limits::SessionLimits;
pub use runner::{SessionRequest, SessionRunner};
pub use types::{AgentTurn, ProposedAction, SessionId, SessionOutcome, SessionState};
