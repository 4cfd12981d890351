mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use nerova_agent::RunSupervisor;
use nerova_driver::AgentPool;
use nerova_llm::CriticClient;
use tower_http::cors::CorsLayer;

use crate::config::Config;

/// One entry per run the server knows how to pause/abort/inspect, keyed by
/// run id (spec.md §C supplemented control endpoints).
pub struct RunEntry {
    pub supervisor: Arc<RunSupervisor>,
    pub status: std::sync::RwLock<String>,
}

/// Shared state for the Brain HTTP surface (spec.md §6), the registered
/// browser workers (spec.md §4.3), and the supplemented run-control
/// endpoints (spec.md §C).
pub struct AppState {
    pub config: Config,
    pub critic: CriticClient,
    pub runs: DashMap<String, Arc<RunEntry>>,
    pub pool: AgentPool,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            critic: CriticClient::new(),
            runs: DashMap::new(),
            pool: AgentPool::new(),
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/v1/brain/bootstrap", post(routes::bootstrap))
        .route("/v1/brain/critic", post(routes::critic))
        .route("/v1/brain/assistant", post(routes::assistant))
        .route("/v1/agents/ws", get(routes::agent_ws))
        .route("/v1/runs", post(routes::start_run))
        .route("/v1/runs/:id", get(routes::run_status))
        .route("/v1/runs/:id/pause", post(routes::pause_run))
        .route("/v1/runs/:id/context", post(routes::supply_context))
        .route("/v1/runs/:id/abort", post(routes::abort_run))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
