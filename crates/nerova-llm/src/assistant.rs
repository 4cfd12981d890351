use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use nerova_types::{NeverPause, PauseSignal};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::LlmError;
use crate::prompts::ACTION_DISAMBIGUATOR_SYSTEM_PROMPT;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const FILES_URL: &str = "https://api.openai.com/v1/files";
const THREADS_URL: &str = "https://api.openai.com/v1/threads";
const DEFAULT_ASSISTANT_MODEL: &str = "gpt-5-nano";
const DEFAULT_POLL_TIMEOUT_MS: u64 = 30_000;
const POLL_INTERVAL_MS: u64 = 800;

/// `action ∈ {click, accept, scroll, stop, unknown}` plus the fields needed
/// to resolve a click (spec.md §4.4).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AssistantAction {
    Click,
    Accept,
    Scroll,
    Stop,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AssistantDecision {
    pub action: AssistantAction,
    pub reason: Option<String>,
    pub confidence: f64,
    pub center: Option<[f64; 2]>,
    pub candidate_id: Option<String>,
}

impl AssistantDecision {
    /// spec.md §4.2 step 7: accept only `click`/`accept` with a 2-tuple
    /// center and confidence >= 0.6.
    pub fn is_confident_click(&self) -> bool {
        matches!(self.action, AssistantAction::Click | AssistantAction::Accept)
            && self.center.is_some()
            && self.confidence >= 0.6
    }
}

/// Abstraction the click resolver depends on, so it can be exercised without
/// a live HTTP dependency in tests.
#[async_trait]
pub trait AssistantResolver: Send + Sync {
    async fn disambiguate(
        &self,
        prompt: &str,
        target: Value,
        candidates: Vec<Value>,
        screenshot_png: &[u8],
    ) -> Result<AssistantDecision, LlmError>;
}

pub struct AssistantClient {
    http: reqwest::Client,
    api_key: String,
    assistant_id: Option<String>,
    model: Option<String>,
    poll_timeout_ms: u64,
    pause: Arc<dyn PauseSignal>,
}

impl AssistantClient {
    pub fn new(api_key: impl Into<String>, assistant_id: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client"),
            api_key: api_key.into(),
            assistant_id,
            model: None,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            pause: Arc::new(NeverPause),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_poll_timeout_ms(mut self, ms: u64) -> Self {
        self.poll_timeout_ms = ms;
        self
    }

    /// Signal the caller's run supervisor owns; every outbound call below
    /// fetches a fresh cancellation token from it right before racing it, so
    /// a pause/resume cycle mid-run is always observed (spec.md §5) instead
    /// of a snapshot token going stale after resume.
    pub fn with_pause_signal(mut self, pause: Arc<dyn PauseSignal>) -> Self {
        self.pause = pause;
        self
    }

    async fn send_or_cancel(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, LlmError> {
        let cancel: CancellationToken = self.pause.cancellation_token();
        tokio::select! {
            res = builder.send() => Ok(res?),
            _ = cancel.cancelled() => Err(LlmError::PauseInterrupt),
        }
    }

    async fn chat_completions_fallback(
        &self,
        payload: &Value,
        screenshot_png: &[u8],
    ) -> Result<AssistantDecision, LlmError> {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(screenshot_png));
        let body = json!({
            "model": self.model.clone().unwrap_or_else(|| DEFAULT_ASSISTANT_MODEL.to_string()),
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": ACTION_DISAMBIGUATOR_SYSTEM_PROMPT },
                { "role": "user", "content": [
                    { "type": "text", "text": payload.to_string() },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ]},
            ],
        });

        let builder = self.http.post(CHAT_URL).bearer_auth(&self.api_key).json(&body);
        let response = self.send_or_cancel(builder).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::AssistantHttp(status.as_u16()));
        }

        let raw: Value = response.json().await?;
        let content = raw["choices"][0]["message"]["content"].as_str().unwrap_or_default();
        Ok(serde_json::from_str(content)?)
    }

    async fn assistants_api_mode(
        &self,
        assistant_id: &str,
        payload: &Value,
        screenshot_png: &[u8],
    ) -> Result<AssistantDecision, LlmError> {
        let file_id = self.upload_screenshot(screenshot_png).await?;
        let thread_id = self.create_thread().await?;
        self.post_message(&thread_id, payload, &file_id).await?;
        let run_id = self.create_run(&thread_id, assistant_id).await?;
        self.poll_run(&thread_id, &run_id).await?;
        self.extract_latest_assistant_text(&thread_id).await
    }

    async fn upload_screenshot(&self, png: &[u8]) -> Result<String, LlmError> {
        let part = reqwest::multipart::Part::bytes(png.to_vec())
            .file_name("screenshot.png")
            .mime_str("image/png")
            .map_err(LlmError::Request)?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let builder = self.http.post(FILES_URL).bearer_auth(&self.api_key).multipart(form);
        let response = self.send_or_cancel(builder).await?;
        let raw: Value = response.json().await?;
        raw["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| LlmError::Parse(serde::de::Error::custom("missing file id")))
    }

    async fn create_thread(&self) -> Result<String, LlmError> {
        let builder = self
            .http
            .post(THREADS_URL)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&json!({}));
        let response = self.send_or_cancel(builder).await?;
        let raw: Value = response.json().await?;
        raw["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| LlmError::Parse(serde::de::Error::custom("missing thread id")))
    }

    async fn post_message(&self, thread_id: &str, payload: &Value, file_id: &str) -> Result<(), LlmError> {
        let url = format!("{THREADS_URL}/{thread_id}/messages");
        let body = json!({
            "role": "user",
            "content": [
                { "type": "text", "text": payload.to_string() },
                { "type": "image_file", "image_file": { "file_id": file_id } },
            ],
        });
        let builder = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&body);
        self.send_or_cancel(builder).await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<String, LlmError> {
        let url = format!("{THREADS_URL}/{thread_id}/runs");
        let builder = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&json!({ "assistant_id": assistant_id }));
        let response = self.send_or_cancel(builder).await?;
        let raw: Value = response.json().await?;
        raw["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| LlmError::Parse(serde::de::Error::custom("missing run id")))
    }

    async fn poll_run(&self, thread_id: &str, run_id: &str) -> Result<(), LlmError> {
        let url = format!("{THREADS_URL}/{thread_id}/runs/{run_id}");
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.poll_timeout_ms);

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(LlmError::AssistantTimeout);
            }
            let cancel = self.pause.cancellation_token();
            if cancel.is_cancelled() {
                return Err(LlmError::PauseInterrupt);
            }

            let builder = self
                .http
                .get(&url)
                .bearer_auth(&self.api_key)
                .header("OpenAI-Beta", "assistants=v2");
            let response = self.send_or_cancel(builder).await?;
            let raw: Value = response.json().await?;
            let status = raw["status"].as_str().unwrap_or_default();

            match status {
                "completed" => return Ok(()),
                "failed" | "cancelled" | "expired" => {
                    return Err(LlmError::AssistantRunFailed(status.to_string()))
                }
                _ => {
                    debug!(%status, "assistant run still in progress");
                    let cancel = self.pause.cancellation_token();
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)) => {}
                        _ = cancel.cancelled() => return Err(LlmError::PauseInterrupt),
                    }
                }
            }
        }
    }

    async fn extract_latest_assistant_text(&self, thread_id: &str) -> Result<AssistantDecision, LlmError> {
        let url = format!("{THREADS_URL}/{thread_id}/messages");
        let builder = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2");
        let response = self.send_or_cancel(builder).await?;
        let raw: Value = response.json().await?;
        let messages = raw["data"].as_array().cloned().unwrap_or_default();

        for message in messages {
            if message["role"] != "assistant" {
                continue;
            }
            if let Some(parts) = message["content"].as_array() {
                for part in parts {
                    let kind = part["type"].as_str().unwrap_or_default();
                    if kind == "text" {
                        if let Some(text) = part["text"]["value"].as_str() {
                            return Ok(serde_json::from_str(text)?);
                        }
                    } else if kind == "output_text" {
                        if let Some(text) = part["output_text"].as_str() {
                            return Ok(serde_json::from_str(text)?);
                        }
                    }
                }
            }
        }

        warn!("no assistant text content found in thread");
        Err(LlmError::Parse(serde::de::Error::custom(
            "no text content in assistant response",
        )))
    }
}

#[async_trait]
impl AssistantResolver for AssistantClient {
    async fn disambiguate(
        &self,
        prompt: &str,
        target: Value,
        candidates: Vec<Value>,
        screenshot_png: &[u8],
    ) -> Result<AssistantDecision, LlmError> {
        let candidates: Vec<Value> = candidates.into_iter().take(12).collect();
        let payload = json!({
            "goal": prompt,
            "target": target,
            "candidates": candidates,
        });

        match &self.assistant_id {
            Some(id) => self.assistants_api_mode(id, &payload, screenshot_png).await,
            None => self.chat_completions_fallback(&payload, screenshot_png).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_click_requires_center_and_threshold() {
        let confident = AssistantDecision {
            action: AssistantAction::Click,
            reason: None,
            confidence: 0.74,
            center: Some([312.0, 540.0]),
            candidate_id: Some("link-1".to_string()),
        };
        assert!(confident.is_confident_click());

        let low_confidence = AssistantDecision {
            confidence: 0.4,
            ..confident.clone()
        };
        assert!(!low_confidence.is_confident_click());

        let no_center = AssistantDecision {
            center: None,
            ..confident.clone()
        };
        assert!(!no_center.is_confident_click());

        let wrong_action = AssistantDecision {
            action: AssistantAction::Scroll,
            ..confident
        };
        assert!(!wrong_action.is_confident_click());
    }
}
