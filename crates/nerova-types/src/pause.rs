use tokio_util::sync::CancellationToken;

/// Narrow read-only view of the run supervisor's pause/abort flags, shared
/// across crates that need to check suspension points (spec.md §5) without
/// depending on the full control-loop supervisor.
pub trait PauseSignal: Send + Sync {
    fn pause_requested(&self) -> bool;
    fn abort_requested(&self) -> bool;

    /// A token that cancels as soon as a pause or abort is requested.
    /// Callers awaiting an HTTP call or driver command race it via
    /// `tokio::select!` so a pause interrupts mid-flight (spec.md §5),
    /// rather than only at the next loop-top check. Implementations that
    /// never pause (e.g. `NeverPause`) may return a token that never
    /// cancels.
    fn cancellation_token(&self) -> CancellationToken;
}

/// A signal that never pauses or aborts; used in tests and for callers that
/// don't participate in the run supervisor (e.g. a bootstrap-only probe).
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverPause;

impl PauseSignal for NeverPause {
    fn pause_requested(&self) -> bool {
        false
    }
    fn abort_requested(&self) -> bool {
        false
    }
    fn cancellation_token(&self) -> CancellationToken {
        CancellationToken::new()
    }
}
