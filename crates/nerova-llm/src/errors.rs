use thiserror::Error;

/// Upstream error taxonomy, spec.md §7 class (b).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{role}_api_key_missing")]
    KeyMissing { role: &'static str },

    #[error("critic_http_{0}")]
    CriticHttp(u16),

    #[error("assistant_http_{0}")]
    AssistantHttp(u16),

    #[error("assistant_timeout")]
    AssistantTimeout,

    #[error("assistant run {0}")]
    AssistantRunFailed(String),

    #[error("interrupted by pause")]
    PauseInterrupt,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}
