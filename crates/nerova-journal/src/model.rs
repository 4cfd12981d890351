use chrono::{DateTime, Utc};
use serde::Serialize;

/// One line of `run.log`: plain text prefixed by an ISO timestamp.
#[derive(Clone, Debug, Serialize)]
pub struct RunLogLine {
    pub ts: DateTime<Utc>,
    pub message: String,
}

impl RunLogLine {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            message: message.into(),
        }
    }

    pub fn render(&self) -> String {
        format!("{} {}", self.ts.to_rfc3339(), self.message)
    }
}

/// One line of `workflow.log`: a JSON object keyed by `stage`.
#[derive(Clone, Debug, Serialize)]
pub struct WorkflowEvent {
    pub ts: DateTime<Utc>,
    pub stage: String,
    #[serde(flatten)]
    pub detail: serde_json::Value,
}

impl WorkflowEvent {
    pub fn new(stage: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            ts: Utc::now(),
            stage: stage.into(),
            detail,
        }
    }
}

/// `meta.json`: fixed facts about the run, written once at init.
#[derive(Clone, Debug, Serialize)]
pub struct RunMeta {
    pub run_id: String,
    pub base_prompt: String,
    pub started_at: DateTime<Utc>,
    pub max_steps: u32,
}

/// `summary.json`: the final outcome, written exactly once at finalize.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: String,
    pub iterations: u32,
    pub complete_history: Vec<String>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<String>,
}
