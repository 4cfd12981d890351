use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nerova_types::{AgentId, AgentRecord, AgentStatus, RunId};

use crate::commands::WorkerCommand;
use crate::error::DriverError;
use crate::protocol::{CommandFrame, WorkerMessage};

type Waiter = oneshot::Sender<Result<Value, DriverError>>;

/// One registered browser worker: its outbound socket sink, bookkeeping, and
/// outstanding-command waiter map (spec.md §3 Agent, §4.3 correlation).
pub struct AgentHandle {
    record: Mutex<AgentRecord>,
    outbound: mpsc::Sender<Value>,
    inflight: Mutex<HashMap<String, Waiter>>,
}

impl AgentHandle {
    fn new(id: AgentId, outbound: mpsc::Sender<Value>) -> Self {
        Self {
            record: Mutex::new(AgentRecord::new(id)),
            outbound,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn id(&self) -> AgentId {
        self.record.lock().await.id.clone()
    }

    pub async fn status(&self) -> AgentStatus {
        self.record.lock().await.status
    }

    pub async fn snapshot(&self) -> AgentRecord {
        self.record.lock().await.clone()
    }

    /// Send a command frame and await its correlated `RESPONSE`, timing out
    /// per `WorkerCommand::default_timeout` unless overridden, or returning
    /// early if `cancel` fires first (spec.md §5: a pause interrupts an
    /// in-flight command rather than waiting for it to finish).
    pub async fn send_command(
        &self,
        command: WorkerCommand,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Value, DriverError> {
        if self.outbound.is_closed() {
            return Err(DriverError::AgentSocketNotOpen);
        }

        let id = Uuid::new_v4().to_string();
        let deadline = timeout.unwrap_or_else(|| command.default_timeout());
        let frame = CommandFrame::new(id.clone(), command);
        let json = serde_json::to_value(&frame)
            .map_err(|err| DriverError::Internal(err.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.inflight.lock().await.insert(id.clone(), tx);

        if self.outbound.send(json).await.is_err() {
            self.inflight.lock().await.remove(&id);
            return Err(DriverError::AgentSocketNotOpen);
        }

        tokio::select! {
            res = tokio::time::timeout(deadline, rx) => match res {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(DriverError::AgentDisconnected),
                Err(_) => {
                    self.inflight.lock().await.remove(&id);
                    Err(DriverError::AgentCommandTimeout(deadline))
                }
            },
            _ = cancel.cancelled() => {
                self.inflight.lock().await.remove(&id);
                Err(DriverError::PauseInterrupt)
            }
        }
    }

    async fn mark_seen(&self) {
        self.record.lock().await.last_seen = Utc::now();
    }

    async fn set_status(&self, status: AgentStatus) {
        self.record.lock().await.status = status;
    }

    /// Reject every outstanding waiter, e.g. on socket close.
    async fn fail_all_inflight(&self, err: DriverError) {
        let mut inflight = self.inflight.lock().await;
        for (_, waiter) in inflight.drain() {
            let _ = waiter.send(Err(err.clone()));
        }
    }
}

/// Registry of connected browser workers: handshake, selection, heartbeat
/// pruning, and disconnect handling (spec.md §4.3).
#[derive(Default, Clone)]
pub struct AgentPool {
    agents: Arc<DashMap<AgentId, Arc<AgentHandle>>>,
}

impl AgentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handshake: assign the requested id if free, else generate one.
    pub async fn register(
        &self,
        requested_id: Option<AgentId>,
        outbound: mpsc::Sender<Value>,
    ) -> Arc<AgentHandle> {
        let id = match requested_id {
            Some(id) if !self.agents.contains_key(&id) => id,
            _ => AgentId::new(),
        };

        let handle = Arc::new(AgentHandle::new(id.clone(), outbound));
        handle.set_status(AgentStatus::Idle).await;
        self.agents.insert(id.clone(), handle.clone());
        info!(agent = %id, "agent registered");
        handle
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<AgentHandle>> {
        self.agents.get(id).map(|e| e.clone())
    }

    /// `pickAgent(preferredId?)`: exact match if available, else
    /// most-recently-seen idle, else any (spec.md §4.3).
    pub async fn pick_agent(&self, preferred: Option<&AgentId>) -> Option<Arc<AgentHandle>> {
        if let Some(id) = preferred {
            if let Some(handle) = self.get(id) {
                return Some(handle);
            }
        }

        let mut idle: Vec<Arc<AgentHandle>> = Vec::new();
        let mut any: Vec<Arc<AgentHandle>> = Vec::new();
        for entry in self.agents.iter() {
            let handle = entry.value().clone();
            if handle.status().await == AgentStatus::Idle {
                idle.push(handle.clone());
            }
            any.push(handle);
        }

        if !idle.is_empty() {
            let mut best: Option<Arc<AgentHandle>> = None;
            let mut best_seen = chrono::DateTime::<Utc>::MIN_UTC;
            for handle in idle {
                let seen = handle.snapshot().await.last_seen;
                if seen >= best_seen {
                    best_seen = seen;
                    best = Some(handle);
                }
            }
            return best;
        }

        any.into_iter().next()
    }

    pub async fn assign_run(&self, agent: &Arc<AgentHandle>, run: RunId) {
        let mut record = agent.record.lock().await;
        record.status = AgentStatus::Busy;
        record.current_run = Some(run);
    }

    pub async fn release(&self, agent: &Arc<AgentHandle>) {
        let mut record = agent.record.lock().await;
        record.status = AgentStatus::Idle;
        record.current_run = None;
    }

    /// Dispatch an inbound worker message to the correct handle.
    pub async fn on_message(&self, id: &AgentId, message: WorkerMessage) {
        let Some(handle) = self.get(id) else {
            warn!(agent = %id, "message from unknown agent");
            return;
        };

        handle.mark_seen().await;

        match message {
            WorkerMessage::Handshake { .. } => {}
            WorkerMessage::HandshakeAck => handle.set_status(AgentStatus::Idle).await,
            WorkerMessage::Ping => debug!(agent = %id, "heartbeat ping"),
            WorkerMessage::Pong => {}
            WorkerMessage::Response { id: cmd_id, ok, result, error } => {
                let mut inflight = handle.inflight.lock().await;
                if let Some(waiter) = inflight.remove(&cmd_id) {
                    let outcome = if ok {
                        Ok(result.unwrap_or(Value::Null))
                    } else {
                        Err(DriverError::Internal(
                            error.unwrap_or_else(|| "unknown worker error".to_string()),
                        ))
                    };
                    let _ = waiter.send(outcome);
                }
            }
            WorkerMessage::Event { .. } => {}
            WorkerMessage::Log { message } => debug!(agent = %id, %message, "worker log"),
            WorkerMessage::Status { status } => {
                let parsed = match status.as_str() {
                    "idle" => AgentStatus::Idle,
                    "busy" => AgentStatus::Busy,
                    _ => AgentStatus::Connecting,
                };
                handle.set_status(parsed).await;
            }
        }
    }

    /// Drop an agent on socket close/error, rejecting all pending waiters.
    pub async fn detach(&self, id: &AgentId) {
        if let Some((_, handle)) = self.agents.remove(id) {
            handle.fail_all_inflight(DriverError::AgentDisconnected).await;
            info!(agent = %id, "agent detached");
        }
    }

    /// Prune agents whose `lastSeen` is older than 60s (spec.md §4.3).
    pub async fn prune_stale(&self) -> Vec<AgentId> {
        let now = Utc::now();
        let mut stale = Vec::new();
        for entry in self.agents.iter() {
            if entry.value().snapshot().await.is_stale(now) {
                stale.push(entry.key().clone());
            }
        }
        for id in &stale {
            self.detach(id).await;
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registered_pool() -> (AgentPool, Arc<AgentHandle>, mpsc::Receiver<Value>) {
        let pool = AgentPool::new();
        let (tx, rx) = mpsc::channel(8);
        let handle = pool.register(None, tx).await;
        (pool, handle, rx)
    }

    #[tokio::test]
    async fn pick_agent_prefers_exact_match() {
        let pool = AgentPool::new();
        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);
        let a = pool.register(None, tx1).await;
        let b = pool.register(None, tx2).await;

        let picked = pool.pick_agent(Some(&b.id().await)).await.unwrap();
        assert_eq!(picked.id().await, b.id().await);

        let picked_any = pool.pick_agent(None).await.unwrap();
        assert!(picked_any.id().await == a.id().await || picked_any.id().await == b.id().await);
    }

    #[tokio::test]
    async fn send_command_resolves_on_response() {
        let (pool, handle, mut rx) = registered_pool().await;
        let id = handle.id().await;

        let handle_clone = handle.clone();
        let responder = tokio::spawn(async move {
            let frame = rx.recv().await.unwrap();
            let cmd_id = frame["id"].as_str().unwrap().to_string();
            let msg = WorkerMessage::Response {
                id: cmd_id,
                ok: true,
                result: Some(serde_json::json!({"pong": 5})),
                error: None,
            };
            (msg, id)
        });

        let cancel_token = CancellationToken::new();
        let send_fut = handle.send_command(WorkerCommand::Ping, None, &cancel_token);
        let (msg, id) = responder.await.unwrap();
        pool.on_message(&id, msg).await;

        let result = send_fut.await.unwrap();
        assert_eq!(result["pong"], 5);
        let _ = handle_clone;
    }

    #[tokio::test]
    async fn send_command_times_out() {
        let (_pool, handle, _rx) = registered_pool().await;
        let result = handle
            .send_command(WorkerCommand::Ping, Some(Duration::from_millis(10)), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DriverError::AgentCommandTimeout(_))));
    }

    #[tokio::test]
    async fn send_command_interrupted_by_cancellation() {
        let (_pool, handle, _rx) = registered_pool().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = handle
            .send_command(WorkerCommand::Ping, Some(Duration::from_secs(5)), &cancel)
            .await;
        assert!(matches!(result, Err(DriverError::PauseInterrupt)));
    }

    #[tokio::test]
    async fn detach_fails_inflight_waiters() {
        let (pool, handle, _rx) = registered_pool().await;
        let id = handle.id().await;

        let handle_clone = handle.clone();
        let send_fut = tokio::spawn(async move {
            handle_clone
                .send_command(WorkerCommand::Ping, Some(Duration::from_secs(5)), &CancellationToken::new())
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.detach(&id).await;

        let result = send_fut.await.unwrap();
        assert!(matches!(result, Err(DriverError::AgentDisconnected)));
    }

    #[tokio::test]
    async fn prune_stale_removes_old_agents() {
        let (pool, handle, _rx) = registered_pool().await;
        {
            let mut record = handle.record.lock().await;
            record.last_seen = Utc::now() - chrono::Duration::seconds(61);
        }
        let pruned = pool.prune_stale().await;
        assert_eq!(pruned.len(), 1);
        assert!(pool.get(&handle.id().await).is_none());
    }
}
