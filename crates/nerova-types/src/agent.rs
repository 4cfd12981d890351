use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::run::RunId;

/// Unique identifier for a registered browser worker.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a registered browser worker (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Connecting,
    Idle,
    Busy,
}

/// Bookkeeping record for one registered browser worker. The open transport
/// and outstanding-command waiter map live in `nerova-driver`; this is the
/// serializable snapshot used for selection and journaling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub status: AgentStatus,
    pub last_seen: DateTime<Utc>,
    pub current_run: Option<RunId>,
}

impl AgentRecord {
    pub fn new(id: AgentId) -> Self {
        Self {
            id,
            status: AgentStatus::Connecting,
            last_seen: Utc::now(),
            current_run: None,
        }
    }

    /// Stale threshold from spec.md §4.3: prune agents unseen for > 60s.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        (now - self.last_seen).num_seconds() > 60
    }
}
