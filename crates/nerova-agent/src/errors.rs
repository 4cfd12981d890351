use thiserror::Error;

/// The Control Loop's error taxonomy (spec.md §7): input-validation and
/// browser-class errors terminate the run; transport/upstream errors are
/// wrapped from the crates that produce them.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("prompt_required")]
    PromptRequired,

    #[error("screenshot_failed")]
    ScreenshotFailed,

    #[error("run_aborted")]
    RunAborted,

    #[error("pause_interrupt")]
    PauseInterrupt,

    #[error("unsupported_action_{0}")]
    UnsupportedAction(String),

    #[error("unsupported_mode_{0}")]
    UnsupportedMode(String),

    #[error("brain http error: {0}")]
    BrainHttp(u16),

    #[error("brain request failed: {0}")]
    BrainRequest(#[from] reqwest::Error),

    #[error("brain response parse failed: {0}")]
    BrainParse(#[from] serde_json::Error),

    #[error("driver error: {0}")]
    Driver(nerova_driver::DriverError),

    #[error(transparent)]
    Resolver(nerova_locator::ResolverError),

    #[error("journal error: {0}")]
    Journal(#[from] nerova_journal::JournalError),
}

impl AgentError {
    /// The run terminates with `status=error` and this message in
    /// `summary.json` unless the error is pause/abort control-flow.
    pub fn is_control_flow(&self) -> bool {
        matches!(self, AgentError::RunAborted | AgentError::PauseInterrupt)
    }
}

/// A cancelled driver call surfaces as `PauseInterrupt` directly rather than
/// `Driver(DriverError::PauseInterrupt)`, so `is_control_flow` catches it
/// without callers needing to match into the wrapped variant (spec.md §5).
impl From<nerova_driver::DriverError> for AgentError {
    fn from(err: nerova_driver::DriverError) -> Self {
        match err {
            nerova_driver::DriverError::PauseInterrupt => AgentError::PauseInterrupt,
            other => AgentError::Driver(other),
        }
    }
}

/// Same flattening as above, for the click resolver's own `PauseInterrupt`
/// (which by this point may itself be a flattened driver cancellation).
impl From<nerova_locator::ResolverError> for AgentError {
    fn from(err: nerova_locator::ResolverError) -> Self {
        match err {
            nerova_locator::ResolverError::PauseInterrupt => AgentError::PauseInterrupt,
            other => AgentError::Resolver(other),
        }
    }
}
