use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use nerova_types::{parse_decision, Decision};

use crate::errors::LlmError;
use crate::prompts::{CRITIC_SYSTEM_PROMPT, URL_BOOTSTRAP_CRITIC_SYSTEM_PROMPT};

const CRITIC_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_CRITIC_MODEL: &str = "gpt-5";

/// Everything needed to assemble one Critic call (spec.md §4.4).
pub struct CriticRequestInput<'a> {
    pub prompt: &'a str,
    pub new_context: Option<&'a str>,
    pub screenshot_png: &'a [u8],
    pub current_url: Option<&'a str>,
    pub context_active: bool,
    pub context_step: Option<u32>,
    pub planned_step: Option<&'a str>,
    pub next_steps: &'a [String],
    pub complete_history: &'a [String],
    pub bootstrap: bool,
}

/// Full assembled request, kept around for journaling before the keys are
/// stripped by `nerova-privacy`.
#[derive(Clone, Debug, Serialize)]
pub struct CriticRequestBody {
    pub model: String,
    pub response_format: Value,
    pub messages: Vec<Value>,
}

pub fn build_payload(input: &CriticRequestInput<'_>) -> Value {
    let mut payload = json!({
        "goal": {
            "original_prompt": input.prompt,
            "new_context": input.new_context,
        },
        "context": {
            "current_url": input.current_url,
            "context_active": input.context_active,
            "context_step": input.context_step,
        },
        "complete_history": last_n(input.complete_history, 20),
    });

    if !input.bootstrap {
        payload["plan_window"] = json!({
            "planned_step": input.planned_step,
            "next_steps": input.next_steps,
        });
    }

    payload
}

fn last_n(items: &[String], n: usize) -> Vec<String> {
    if items.len() <= n {
        items.to_vec()
    } else {
        items[items.len() - n..].to_vec()
    }
}

pub fn build_request_body(input: &CriticRequestInput<'_>, model: Option<&str>) -> CriticRequestBody {
    let system_prompt = if input.bootstrap {
        URL_BOOTSTRAP_CRITIC_SYSTEM_PROMPT
    } else {
        CRITIC_SYSTEM_PROMPT
    };

    let payload = build_payload(input);
    let data_url = format!("data:image/png;base64,{}", STANDARD.encode(input.screenshot_png));

    CriticRequestBody {
        model: model.unwrap_or(DEFAULT_CRITIC_MODEL).to_string(),
        response_format: json!({ "type": "json_object" }),
        messages: vec![
            json!({ "role": "system", "content": system_prompt }),
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": payload.to_string() },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            }),
        ],
    }
}

pub struct CriticClient {
    http: reqwest::Client,
}

impl Default for CriticClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CriticClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("reqwest client"),
        }
    }

    /// Send a Critic request and parse the decision. Returns the raw
    /// response body alongside the parsed `Decision` for journaling.
    pub async fn call(
        &self,
        api_key: &str,
        input: &CriticRequestInput<'_>,
        model: Option<&str>,
    ) -> Result<(Decision, Value), LlmError> {
        let body = build_request_body(input, model);
        debug!(model = %body.model, bootstrap = input.bootstrap, "sending critic request");

        let response = self
            .http
            .post(CRITIC_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "critic http error");
            return Err(LlmError::CriticHttp(status.as_u16()));
        }

        let raw: Value = response.json().await?;
        let content = raw["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();
        let decision = parse_decision(content)?;
        Ok((decision, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_request_omits_plan_window() {
        let input = CriticRequestInput {
            prompt: "find flights",
            new_context: None,
            screenshot_png: b"fake-png",
            current_url: Some("https://example.com"),
            context_active: false,
            context_step: None,
            planned_step: None,
            next_steps: &[],
            complete_history: &[],
            bootstrap: true,
        };
        let payload = build_payload(&input);
        assert!(payload.get("plan_window").is_none());

        let body = build_request_body(&input, None);
        let system = body.messages[0]["content"].as_str().unwrap();
        assert!(system.contains("Bootstrap"));
    }

    #[test]
    fn iteration_request_includes_plan_window_and_image() {
        let history: Vec<String> = (0..25).map(|i| format!("step-{i}")).collect();
        let input = CriticRequestInput {
            prompt: "find flights",
            new_context: Some("focus search box"),
            screenshot_png: b"fake-png",
            current_url: Some("https://example.com"),
            context_active: true,
            context_step: Some(2),
            planned_step: Some("click search"),
            next_steps: &["submit".to_string()],
            complete_history: &history,
            bootstrap: false,
        };
        let payload = build_payload(&input);
        assert_eq!(payload["plan_window"]["planned_step"], "click search");
        assert_eq!(payload["complete_history"].as_array().unwrap().len(), 20);

        let body = build_request_body(&input, Some("gpt-5-custom"));
        assert_eq!(body.model, "gpt-5-custom");
        let content_parts = body.messages[1]["content"].as_array().unwrap();
        assert_eq!(content_parts.len(), 2);
        assert!(content_parts[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }
}
