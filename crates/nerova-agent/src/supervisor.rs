use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use nerova_types::PauseSignal;

/// Per-run pause/abort supervisor (spec.md §3 "Pause State", §5, Design Note
/// §9's promotion of the source's module-level flags to a value owned by the
/// run). Holds the generation counters, a single-slot override-context
/// mailbox, and the `Notify` used to wake a barrier blocked on resume.
pub struct RunSupervisor {
    pause_requested: AtomicBool,
    abort_requested: AtomicBool,
    pause_generation: AtomicU64,
    pause_handled_generation: AtomicU64,
    queued_context: Mutex<Vec<String>>,
    resumed: Notify,
    /// Cancelled on every pause/abort request, replaced with a fresh token
    /// on resume. Callers fetch a clone via `cancellation_token()` right
    /// before racing it, so they always observe the live state rather than
    /// a stale snapshot from before a prior pause/resume cycle.
    cancel: StdMutex<CancellationToken>,
}

impl RunSupervisor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pause_requested: AtomicBool::new(false),
            abort_requested: AtomicBool::new(false),
            pause_generation: AtomicU64::new(0),
            pause_handled_generation: AtomicU64::new(0),
            queued_context: Mutex::new(Vec::new()),
            resumed: Notify::new(),
            cancel: StdMutex::new(CancellationToken::new()),
        })
    }

    /// Idempotent: a second call while already paused does not bump the
    /// generation counter again.
    pub fn request_pause(&self) {
        if !self.pause_requested.swap(true, Ordering::SeqCst) {
            self.pause_generation.fetch_add(1, Ordering::SeqCst);
            self.cancel.lock().unwrap().cancel();
            info!(
                generation = self.pause_generation.load(Ordering::SeqCst),
                "pause requested"
            );
        }
    }

    /// Idempotent: aborting an already-aborted run is a no-op beyond waking
    /// any blocked barrier.
    pub fn abort_run(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
        self.cancel.lock().unwrap().cancel();
        info!("abort requested");
        self.resumed.notify_waiters();
    }

    /// Enqueue override context and clear the pause flag, waking the barrier
    /// blocked in `wait_for_resume`. The supplied text may be empty. Issues
    /// a fresh cancellation token so calls made after resume aren't
    /// immediately cancelled by the token from the pause that just ended.
    pub async fn supply_context(&self, text: String) {
        if !text.trim().is_empty() {
            self.queued_context.lock().await.push(text);
        }
        self.pause_handled_generation
            .store(self.pause_generation.load(Ordering::SeqCst), Ordering::SeqCst);
        self.pause_requested.store(false, Ordering::SeqCst);
        *self.cancel.lock().unwrap() = CancellationToken::new();
        self.resumed.notify_waiters();
    }

    /// Consumed at iteration step 3a: exactly one queued context per loop
    /// entry.
    pub async fn take_queued_context(&self) -> Option<String> {
        let mut queue = self.queued_context.lock().await;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }

    /// Blocks until `supply_context` or `abort_run` clears the pause. Called
    /// at a pause barrier once a suspended I/O surfaces `pause_interrupt`.
    pub async fn wait_for_resume(&self) {
        while self.pause_requested.load(Ordering::SeqCst) && !self.abort_requested.load(Ordering::SeqCst) {
            debug!("blocked at pause barrier");
            self.resumed.notified().await;
        }
    }

    pub fn pause_generation(&self) -> u64 {
        self.pause_generation.load(Ordering::SeqCst)
    }
}

impl PauseSignal for RunSupervisor {
    fn pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::SeqCst)
    }

    fn abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst)
    }

    fn cancellation_token(&self) -> CancellationToken {
        self.cancel.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_then_supply_context_resumes() {
        let supervisor = RunSupervisor::new();
        supervisor.request_pause();
        assert!(supervisor.pause_requested());

        let sup2 = supervisor.clone();
        let waiter = tokio::spawn(async move {
            sup2.wait_for_resume().await;
        });

        supervisor.supply_context("focus on search box".to_string()).await;
        waiter.await.unwrap();

        assert!(!supervisor.pause_requested());
        assert_eq!(
            supervisor.take_queued_context().await,
            Some("focus on search box".to_string())
        );
    }

    #[tokio::test]
    async fn cancellation_token_cancels_on_pause_and_resets_on_resume() {
        let supervisor = RunSupervisor::new();
        let token = supervisor.cancellation_token();
        assert!(!token.is_cancelled());

        supervisor.request_pause();
        assert!(token.is_cancelled());

        supervisor.supply_context(String::new()).await;
        assert!(!supervisor.cancellation_token().is_cancelled());
    }

    #[test]
    fn request_pause_is_idempotent() {
        let supervisor = RunSupervisor::new();
        supervisor.request_pause();
        supervisor.request_pause();
        assert_eq!(supervisor.pause_generation(), 1);
    }

    #[tokio::test]
    async fn abort_wakes_pause_barrier() {
        let supervisor = RunSupervisor::new();
        supervisor.request_pause();

        let sup2 = supervisor.clone();
        let waiter = tokio::spawn(async move {
            sup2.wait_for_resume().await;
        });

        supervisor.abort_run();
        waiter.await.unwrap();
        assert!(supervisor.abort_requested());
    }
}
