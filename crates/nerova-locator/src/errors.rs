use thiserror::Error;

/// spec.md §4.2 "Errors": `assistant_error` and `await_assistance` both
/// leave the run in a resumable state; neither is fatal to the run.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("assistant error: {0}")]
    AssistantError(nerova_llm::LlmError),

    #[error("no confident resolution; awaiting assistance")]
    AwaitAssistance,

    #[error("driver error: {0}")]
    Driver(nerova_driver::DriverError),

    #[error("click interrupted by pause")]
    PauseInterrupt,
}

/// A cancelled driver call surfaces as `PauseInterrupt` directly rather than
/// `Driver(DriverError::PauseInterrupt)`, so callers only need to match one
/// variant to detect a pause (spec.md §5).
impl From<nerova_driver::DriverError> for ResolverError {
    fn from(err: nerova_driver::DriverError) -> Self {
        match err {
            nerova_driver::DriverError::PauseInterrupt => ResolverError::PauseInterrupt,
            other => ResolverError::Driver(other),
        }
    }
}
