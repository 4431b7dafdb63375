use crate::config::AgentSettings;

pub const DEFAULT_MAX_TURNS: usize = 20;
pub const DEFAULT_MAX_OUTPUT_RETRIES: usize = 2;

/// Turn budget and output retry allowance of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_turns: usize,
    pub max_output_retries: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            max_output_retries: DEFAULT_MAX_OUTPUT_RETRIES,
        }
    }
}

impl SessionLimits {
    /// Per-request override, then settings, then defaults. Zero turns is ignored.
    pub fn resolve(request_max_turns: Option<usize>, settings: &AgentSettings) -> Self {
        let max_turns = request_max_turns
            .and_then(positive)
            .or(settings.max_turns.and_then(positive))
            .unwrap_or(DEFAULT_MAX_TURNS);
        let max_output_retries = settings
            .max_output_retries
            .unwrap_or(DEFAULT_MAX_OUTPUT_RETRIES);
        Self {
            max_turns,
            max_output_retries,
        }
    }
}

fn positive(value: usize) -> Option<usize> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}
