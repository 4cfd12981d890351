use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use nerova_agent::{BrainClient, RunController, RunParams, RunSupervisor};
use nerova_driver::{RemoteDriver, WelcomeFrame, WorkerMessage};
use nerova_llm::{resolve_assistant_key, resolve_critic_key, AssistantClient, AssistantResolver, CriticRequestInput, LlmError};
use nerova_types::{AgentId, RunId};

use super::{AppState, RunEntry};

pub async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true, "status": "ready" }))
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub mode: String,
    pub prompt: String,
    pub screenshot: String,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "criticKey")]
    pub critic_key: Option<String>,
    pub model: Option<String>,
}

fn strip_data_url_prefix(value: &str) -> &str {
    match value.find("base64,") {
        Some(idx) => &value[idx + "base64,".len()..],
        None => value,
    }
}

fn decode_screenshot(value: &str) -> Result<Vec<u8>, (StatusCode, Json<Value>)> {
    STANDARD.decode(strip_data_url_prefix(value)).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "screenshot_required" })),
        )
    })
}

fn llm_error_response(err: LlmError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        LlmError::KeyMissing { .. } => StatusCode::BAD_REQUEST,
        LlmError::CriticHttp(_) | LlmError::AssistantHttp(_) => StatusCode::BAD_GATEWAY,
        LlmError::AssistantTimeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "ok": false, "error": err.to_string() })))
}

async fn decision_endpoint(
    state: &Arc<AppState>,
    body: DecisionRequest,
    bootstrap: bool,
) -> (StatusCode, Json<Value>) {
    if body.mode != "browser" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": format!("unsupported_mode_{}", body.mode) })),
        );
    }
    if body.prompt.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "prompt_required" })),
        );
    }

    let png = match decode_screenshot(&body.screenshot) {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    let key = match resolve_critic_key(body.critic_key.as_deref()) {
        Ok(key) => key,
        Err(err) => return llm_error_response(err),
    };

    let input = CriticRequestInput {
        prompt: &body.prompt,
        new_context: None,
        screenshot_png: &png,
        current_url: None,
        context_active: false,
        context_step: None,
        planned_step: None,
        next_steps: &[],
        complete_history: &[],
        bootstrap,
    };

    let model = body.model.or_else(|| state.config.critic_model.clone());
    match state.critic.call(&key, &input, model.as_deref()).await {
        Ok((decision, raw)) => {
            let session_id = body.session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let complete_history = decision.complete.clone();
            (
                StatusCode::OK,
                Json(json!({
                    "ok": true,
                    "mode": "browser",
                    "sessionId": session_id,
                    "decision": decision,
                    "critic": raw,
                    "completeHistory": complete_history,
                })),
            )
        }
        Err(err) => llm_error_response(err),
    }
}

pub async fn bootstrap(State(state): State<Arc<AppState>>, Json(body): Json<DecisionRequest>) -> (StatusCode, Json<Value>) {
    decision_endpoint(&state, body, true).await
}

pub async fn critic(State(state): State<Arc<AppState>>, Json(body): Json<DecisionRequest>) -> (StatusCode, Json<Value>) {
    decision_endpoint(&state, body, false).await
}

#[derive(Deserialize)]
pub struct AssistantRequest {
    pub mode: String,
    pub prompt: String,
    pub target: Value,
    #[serde(default)]
    pub elements: Vec<Value>,
    pub screenshot: String,
    #[serde(rename = "assistantKey")]
    pub assistant_key: Option<String>,
    #[serde(rename = "assistantId")]
    pub assistant_id: Option<String>,
    #[serde(rename = "pollTimeoutMs")]
    pub poll_timeout_ms: Option<u64>,
}

pub async fn assistant(State(state): State<Arc<AppState>>, Json(body): Json<AssistantRequest>) -> (StatusCode, Json<Value>) {
    if body.mode != "browser" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": format!("unsupported_mode_{}", body.mode) })),
        );
    }

    let png = match decode_screenshot(&body.screenshot) {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    let key = match resolve_assistant_key(body.assistant_key.as_deref()) {
        Ok(key) => key,
        Err(err) => return llm_error_response(err),
    };

    let assistant_id = body.assistant_id.or_else(|| state.config.assistant_id.clone());
    let mut client = AssistantClient::new(key, assistant_id.clone());
    if let Some(model) = &state.config.assistant_model {
        client = client.with_model(model.clone());
    }
    if let Some(ms) = body.poll_timeout_ms {
        client = client.with_poll_timeout_ms(ms);
    }

    let candidates: Vec<Value> = body.elements.iter().take(12).cloned().collect();
    match client
        .disambiguate(&body.prompt, body.target.clone(), candidates.clone(), &png)
        .await
    {
        Ok(decision) => {
            let request = json!({ "goal": body.prompt, "target": body.target, "candidates": candidates });
            let raw = serde_json::to_value(&decision).unwrap_or(Value::Null);
            (
                StatusCode::OK,
                Json(json!({
                    "ok": true,
                    "mode": "browser",
                    "assistant": {
                        "ok": true,
                        "raw": raw,
                        "parsed": decision,
                        "request": request,
                        "model": assistant_id.unwrap_or_else(|| "chat-completions-fallback".to_string()),
                    },
                })),
            )
        }
        Err(err) => {
            let (status, Json(body)) = llm_error_response(err);
            (
                status,
                Json(json!({ "ok": false, "mode": "browser", "assistant": { "ok": false }, "error": body["error"] })),
            )
        }
    }
}

/// Handshake endpoint browser workers connect to (spec.md §4.3). Registers
/// the socket in the pool, sends `WELCOME{agentId}`, then forwards frames
/// in both directions until the socket closes.
pub async fn agent_ws(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_agent_socket(socket, state))
}

async fn handle_agent_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel::<Value>(32);
    let handle = state.pool.register(None, tx.clone()).await;
    let id = handle.id().await;

    let welcome = serde_json::to_value(WelcomeFrame::new(id.to_string())).unwrap_or_else(|_| json!({}));
    if tx.send(welcome).await.is_err() {
        state.pool.detach(&id).await;
        return;
    }

    let forward = tokio::spawn(forward_outbound(sink, rx));

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<WorkerMessage>(&text) {
                Ok(parsed) => state.pool.on_message(&id, parsed).await,
                Err(err) => warn!(agent = %id, %err, "invalid worker frame"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.pool.detach(&id).await;
    forward.abort();
}

async fn forward_outbound(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Value>) {
    while let Some(value) = rx.recv().await {
        let Ok(text) = serde_json::to_string(&value) else {
            continue;
        };
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

#[derive(Deserialize)]
pub struct StartRunRequest {
    pub prompt: String,
    #[serde(default)]
    pub context_notes: Vec<String>,
    #[serde(rename = "agentId")]
    pub agent_id: Option<String>,
    #[serde(rename = "maxSteps")]
    pub max_steps: Option<u32>,
    #[serde(rename = "bootUrl")]
    pub boot_url: Option<String>,
    #[serde(rename = "criticKey")]
    pub critic_key: Option<String>,
    #[serde(rename = "assistantKey")]
    pub assistant_key: Option<String>,
    #[serde(rename = "assistantId")]
    pub assistant_id: Option<String>,
}

/// Starts a run on a connected browser worker and returns immediately with
/// the new run's id; the run itself progresses in a spawned task (spec.md
/// §C supplemented run-control endpoints).
pub async fn start_run(State(state): State<Arc<AppState>>, Json(body): Json<StartRunRequest>) -> (StatusCode, Json<Value>) {
    if body.prompt.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "prompt_required" })),
        );
    }

    let preferred = body.agent_id.clone().map(AgentId);
    let Some(agent) = state.pool.pick_agent(preferred.as_ref()).await else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ok": false, "error": "no_agent_available" })),
        );
    };

    let run_id = Uuid::new_v4().to_string();
    let supervisor = RunSupervisor::new();
    let driver = Arc::new(
        RemoteDriver::new(agent.clone(), supervisor.clone())
            .with_screenshot_timeout(Duration::from_millis(state.config.screenshot_timeout_ms)),
    );
    let brain_url = format!("http://{}:{}", state.config.host, state.config.port);
    let assistant_id = body
        .assistant_id
        .clone()
        .or_else(|| state.config.assistant_id.clone());
    let brain = Arc::new(
        BrainClient::new(brain_url)
            .with_assistant_credentials(body.assistant_key.clone(), assistant_id)
            .with_pause_signal(supervisor.clone()),
    );

    state.pool.assign_run(&agent, RunId(run_id.clone())).await;
    state.runs.insert(
        run_id.clone(),
        Arc::new(RunEntry {
            supervisor: supervisor.clone(),
            status: std::sync::RwLock::new("in_progress".to_string()),
        }),
    );

    let params = RunParams {
        prompt: body.prompt,
        context_notes: body.context_notes,
        critic_key: body.critic_key,
        critic_model: state.config.critic_model.clone(),
        max_steps: body.max_steps.unwrap_or(state.config.max_steps),
        boot_url: body.boot_url.or_else(|| state.config.boot_url.clone()),
    };

    let log_dir = state.config.log_dir.clone();
    let click_radius = state.config.click_radius;
    let state_for_task = state.clone();
    let agent_for_task = agent.clone();
    let run_id_for_task = run_id.clone();

    tokio::spawn(async move {
        let controller = RunController::new(driver, brain, supervisor, click_radius);
        let mut journal = match nerova_journal::RunJournal::create(&log_dir, chrono::Utc::now()) {
            Ok(journal) => journal,
            Err(err) => {
                warn!(error = %err, "failed to create run journal");
                state_for_task.pool.release(&agent_for_task).await;
                if let Some(entry) = state_for_task.runs.get(&run_id_for_task) {
                    *entry.status.write().unwrap() = "error".to_string();
                }
                return;
            }
        };
        let artifact_dir = journal.dir().display().to_string();

        let outcome = controller.run(params, &artifact_dir, &mut journal).await;
        let new_status = match outcome {
            Ok(summary) => summary.status,
            Err(err) => {
                warn!(error = %err, "run task failed");
                "error".to_string()
            }
        };
        if let Some(entry) = state_for_task.runs.get(&run_id_for_task) {
            *entry.status.write().unwrap() = new_status;
        }
        state_for_task.pool.release(&agent_for_task).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "ok": true, "runId": run_id })),
    )
}

pub async fn run_status(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.runs.get(&id) {
        Some(entry) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "runId": id, "status": *entry.status.read().unwrap() })),
        ),
        None => (StatusCode::NOT_FOUND, Json(json!({ "ok": false, "error": "run_not_found" }))),
    }
}

pub async fn pause_run(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.runs.get(&id) {
        Some(entry) => {
            entry.supervisor.request_pause();
            (StatusCode::OK, Json(json!({ "ok": true })))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "ok": false, "error": "run_not_found" }))),
    }
}

#[derive(Deserialize)]
pub struct ContextBody {
    #[serde(default)]
    pub text: String,
}

pub async fn supply_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ContextBody>,
) -> (StatusCode, Json<Value>) {
    match state.runs.get(&id) {
        Some(entry) => {
            entry.supervisor.supply_context(body.text).await;
            (StatusCode::OK, Json(json!({ "ok": true })))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "ok": false, "error": "run_not_found" }))),
    }
}

pub async fn abort_run(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.runs.get(&id) {
        Some(entry) => {
            entry.supervisor.abort_run();
            (StatusCode::OK, Json(json!({ "ok": true })))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "ok": false, "error": "run_not_found" }))),
    }
}
