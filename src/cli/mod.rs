//! CLI entrypoint: `run`, `serve`, `pause`, `resume`, `abort` subcommands
//! (spec.md §B), wired with `clap` derive macros the way the teacher wires
//! its own binary subcommands.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{error, info};

use nerova_agent::{BrainClient, RunController, RunParams, RunSupervisor};
use nerova_driver::{AgentPool, RemoteDriver};
use nerova_journal::RunJournal;

use crate::config::Config;
use crate::server::{self, AppState, RunEntry};

#[derive(Parser)]
#[command(name = "nerovaagent", version, about = "Autonomous web-browsing agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the Brain HTTP surface and wait for browser workers to connect.
    Serve,
    /// Run one goal end-to-end against a worker already connected to a
    /// local server, starting that server in-process if none is reachable.
    Run {
        /// Natural-language goal the run pursues.
        #[arg(long)]
        prompt: String,
        /// Extra context lines appended to the base prompt.
        #[arg(long = "context")]
        context_notes: Vec<String>,
        #[arg(long = "boot-url")]
        boot_url: Option<String>,
        #[arg(long = "critic-key")]
        critic_key: Option<String>,
        #[arg(long = "assistant-key")]
        assistant_key: Option<String>,
        #[arg(long = "assistant-id")]
        assistant_id: Option<String>,
        #[arg(long = "max-steps")]
        max_steps: Option<u32>,
    },
    /// Request that a running agent pause at its next loop-top barrier.
    Pause {
        #[arg(long = "run-id")]
        run_id: String,
        #[arg(long = "brain-url")]
        brain_url: Option<String>,
    },
    /// Supply override context and resume a paused run.
    Resume {
        #[arg(long = "run-id")]
        run_id: String,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long = "brain-url")]
        brain_url: Option<String>,
    },
    /// Abort a run; it unwinds at its next barrier.
    Abort {
        #[arg(long = "run-id")]
        run_id: String,
        #[arg(long = "brain-url")]
        brain_url: Option<String>,
    },
}

pub async fn dispatch(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve => serve(config).await,
        Command::Run {
            prompt,
            context_notes,
            boot_url,
            critic_key,
            assistant_key,
            assistant_id,
            max_steps,
        } => {
            run_standalone(
                config,
                prompt,
                context_notes,
                boot_url,
                critic_key,
                assistant_key,
                assistant_id,
                max_steps,
            )
            .await
        }
        Command::Pause { run_id, brain_url } => {
            post_control(&brain_url.unwrap_or(config.brain_url), &run_id, "pause", Value::Null).await
        }
        Command::Resume { run_id, text, brain_url } => {
            post_control(
                &brain_url.unwrap_or(config.brain_url),
                &run_id,
                "context",
                json!({ "text": text }),
            )
            .await
        }
        Command::Abort { run_id, brain_url } => {
            post_control(&brain_url.unwrap_or(config.brain_url), &run_id, "abort", Value::Null).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr: std::net::SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(%addr, "brain http surface listening");
    let state = AppState::new(config);
    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// One-shot `run`: waits for exactly one worker to register against an
/// in-process server, then drives `RunController` directly without going
/// through the `/v1/runs` HTTP indirection.
#[allow(clippy::too_many_arguments)]
async fn run_standalone(
    config: Config,
    prompt: String,
    context_notes: Vec<String>,
    boot_url: Option<String>,
    critic_key: Option<String>,
    assistant_key: Option<String>,
    assistant_id: Option<String>,
    max_steps: Option<u32>,
) -> anyhow::Result<()> {
    let port = config.port;
    let host = config.host.clone();
    let brain_url = format!("http://{host}:{port}");

    let state = AppState::new(config.clone());
    let router = server::build_router(Arc::clone(&state));
    let addr: std::net::SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            error!(%err, "brain http surface exited");
        }
    });

    info!(%brain_url, "waiting for a browser worker to connect at /v1/agents/ws");
    let agent = wait_for_agent(&state.pool).await;

    let supervisor = RunSupervisor::new();
    let driver = Arc::new(
        RemoteDriver::new(agent.clone(), supervisor.clone())
            .with_screenshot_timeout(Duration::from_millis(config.screenshot_timeout_ms)),
    );
    let brain = Arc::new(
        BrainClient::new(brain_url.clone())
            .with_assistant_credentials(assistant_key, assistant_id.or_else(|| config.assistant_id.clone()))
            .with_pause_signal(supervisor.clone()),
    );
    let run_id = uuid::Uuid::new_v4().to_string();
    state.runs.insert(
        run_id.clone(),
        Arc::new(RunEntry {
            supervisor: supervisor.clone(),
            status: std::sync::RwLock::new("in_progress".to_string()),
        }),
    );
    println!("run id: {run_id} (pause/resume/abort against {brain_url})");

    let controller = RunController::new(driver, brain, supervisor, config.click_radius);

    let mut journal = RunJournal::create(&config.log_dir, chrono::Utc::now())?;
    let artifact_dir = journal.dir().display().to_string();

    let params = RunParams {
        prompt,
        context_notes,
        critic_key,
        critic_model: config.critic_model.clone(),
        max_steps: max_steps.unwrap_or(config.max_steps),
        boot_url: boot_url.or_else(|| config.boot_url.clone()),
    };

    let summary = controller.run(params, &artifact_dir, &mut journal).await?;
    println!(
        "run completed after {} iterations with status {}",
        summary.iterations, summary.status
    );
    if let Some(entry) = state.runs.get(&run_id) {
        *entry.status.write().unwrap() = summary.status.clone();
    }

    state.pool.release(&agent).await;
    server_task.abort();
    Ok(())
}

async fn wait_for_agent(pool: &AgentPool) -> Arc<nerova_driver::AgentHandle> {
    loop {
        if let Some(agent) = pool.pick_agent(None).await {
            return agent;
        }
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
}

async fn post_control(brain_url: &str, run_id: &str, action: &str, body: Value) -> anyhow::Result<()> {
    let url = format!("{brain_url}/v1/runs/{run_id}/{action}");
    let client = reqwest::Client::new();
    let response = client.post(&url).json(&body).send().await?;
    let status = response.status();
    let payload: Value = response.json().await.unwrap_or(Value::Null);
    if status.is_success() {
        println!("{action} ok: {payload}");
        Ok(())
    } else {
        anyhow::bail!("{action} failed ({status}): {payload}")
    }
}
