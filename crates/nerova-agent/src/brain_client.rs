use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use nerova_llm::{AssistantDecision, AssistantResolver, LlmError};
use nerova_types::{Decision, NeverPause, PauseSignal};

use crate::errors::AgentError;

/// Inputs the loop already has in hand when it calls the brain's Critic
/// endpoints (spec.md §6).
pub struct CriticCallInput<'a> {
    pub prompt: &'a str,
    pub screenshot_png: &'a [u8],
    pub session_id: Option<&'a str>,
    pub critic_key: Option<&'a str>,
    pub model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct BrainDecisionResponse {
    pub ok: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub complete_history: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantEnvelope {
    ok: bool,
    assistant: AssistantBlock,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantBlock {
    ok: bool,
    #[serde(default)]
    parsed: Option<AssistantDecision>,
}

/// HTTP client for the Brain surface described in spec.md §6
/// (`/v1/brain/bootstrap`, `/v1/brain/critic`, `/v1/brain/assistant`). The
/// loop talks to this surface rather than calling OpenAI directly, matching
/// the `brainURL` parameter on `Run(...)`; the root binary's server exposes
/// the surface itself using `nerova-llm`.
pub struct BrainClient {
    http: reqwest::Client,
    base_url: String,
    assistant_key: Option<String>,
    assistant_id: Option<String>,
    pause: Arc<dyn PauseSignal>,
}

impl BrainClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client"),
            base_url: base_url.into(),
            assistant_key: None,
            assistant_id: None,
            pause: Arc::new(NeverPause),
        }
    }

    /// Credentials forwarded on every `disambiguate` call made through the
    /// `AssistantResolver` impl below, since that trait's signature carries
    /// no per-call key.
    pub fn with_assistant_credentials(mut self, key: Option<String>, id: Option<String>) -> Self {
        self.assistant_key = key;
        self.assistant_id = id;
        self
    }

    /// Signal the run's `RunSupervisor` owns; every HTTP call below fetches
    /// a fresh cancellation token right before racing it, so a pause
    /// interrupts mid-request (spec.md §5) across any number of pause/resume
    /// cycles within the run.
    pub fn with_pause_signal(mut self, pause: Arc<dyn PauseSignal>) -> Self {
        self.pause = pause;
        self
    }

    fn screenshot_data_url(png: &[u8]) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(png))
    }

    pub async fn bootstrap(&self, input: &CriticCallInput<'_>) -> Result<BrainDecisionResponse, AgentError> {
        self.call_decision_endpoint("bootstrap", input).await
    }

    pub async fn critic(&self, input: &CriticCallInput<'_>) -> Result<BrainDecisionResponse, AgentError> {
        self.call_decision_endpoint("critic", input).await
    }

    async fn call_decision_endpoint(
        &self,
        endpoint: &str,
        input: &CriticCallInput<'_>,
    ) -> Result<BrainDecisionResponse, AgentError> {
        let url = format!("{}/v1/brain/{endpoint}", self.base_url);
        let body = json!({
            "mode": "browser",
            "prompt": input.prompt,
            "screenshot": Self::screenshot_data_url(input.screenshot_png),
            "sessionId": input.session_id,
            "criticKey": input.critic_key,
            "model": input.model,
        });

        debug!(%url, "calling brain decision endpoint");
        let cancel = self.pause.cancellation_token();
        let response = tokio::select! {
            res = self.http.post(&url).json(&body).send() => res?,
            _ = cancel.cancelled() => return Err(AgentError::PauseInterrupt),
        };
        let status = response.status();
        if !status.is_success() {
            warn!(%status, %endpoint, "brain http error");
            return Err(AgentError::BrainHttp(status.as_u16()));
        }
        Ok(response.json::<BrainDecisionResponse>().await?)
    }

    pub async fn assistant(
        &self,
        prompt: &str,
        target: Value,
        candidates: Vec<Value>,
        screenshot_png: &[u8],
        assistant_key: Option<&str>,
        assistant_id: Option<&str>,
    ) -> Result<AssistantDecision, AgentError> {
        let url = format!("{}/v1/brain/assistant", self.base_url);
        let body = json!({
            "mode": "browser",
            "prompt": prompt,
            "target": target,
            "elements": candidates,
            "screenshot": Self::screenshot_data_url(screenshot_png),
            "assistantKey": assistant_key,
            "assistantId": assistant_id,
        });

        let cancel = self.pause.cancellation_token();
        let response = tokio::select! {
            res = self.http.post(&url).json(&body).send() => res?,
            _ = cancel.cancelled() => return Err(AgentError::PauseInterrupt),
        };
        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::BrainHttp(status.as_u16()));
        }

        let envelope: AssistantEnvelope = response.json().await?;
        if !envelope.ok || !envelope.assistant.ok {
            return Err(AgentError::BrainHttp(502));
        }
        envelope
            .assistant
            .parsed
            .ok_or(AgentError::BrainHttp(502))
    }
}

/// Lets `nerova-locator`'s `ClickResolver` disambiguate through the Brain
/// surface instead of holding its own OpenAI credentials.
#[async_trait]
impl AssistantResolver for BrainClient {
    async fn disambiguate(
        &self,
        prompt: &str,
        target: Value,
        candidates: Vec<Value>,
        screenshot_png: &[u8],
    ) -> Result<AssistantDecision, LlmError> {
        self.assistant(
            prompt,
            target,
            candidates,
            screenshot_png,
            self.assistant_key.as_deref(),
            self.assistant_id.as_deref(),
        )
        .await
            .map_err(|err| match err {
                AgentError::BrainHttp(code) => LlmError::AssistantHttp(code),
                AgentError::BrainRequest(source) => LlmError::Request(source),
                AgentError::BrainParse(source) => LlmError::Parse(source),
                AgentError::PauseInterrupt => LlmError::PauseInterrupt,
                // assistant() only ever produces the variants above.
                _ => LlmError::AssistantHttp(0),
            })
    }
}
