use thiserror::Error;

/// Transport-layer error taxonomy, spec.md §7 class (c).
#[derive(Debug, Error, Clone)]
pub enum DriverError {
    #[error("no agent available")]
    AgentUnavailable,

    #[error("command timed out after {0:?}")]
    AgentCommandTimeout(std::time::Duration),

    #[error("agent disconnected")]
    AgentDisconnected,

    #[error("agent socket not open")]
    AgentSocketNotOpen,

    #[error("command interrupted by pause")]
    PauseInterrupt,

    #[error("internal driver error: {0}")]
    Internal(String),
}

impl DriverError {
    pub fn code(&self) -> &'static str {
        match self {
            DriverError::AgentUnavailable => "agent_unavailable",
            DriverError::AgentCommandTimeout(_) => "agent_command_timeout",
            DriverError::AgentDisconnected => "agent_disconnected",
            DriverError::AgentSocketNotOpen => "agent_socket_not_open",
            DriverError::PauseInterrupt => "pause_interrupt",
            DriverError::Internal(_) => "internal",
        }
    }
}
