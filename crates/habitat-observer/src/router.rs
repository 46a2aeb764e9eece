//! Axum router construction for the observer server.
//!
//! Assembles the full HTTP surface with CORS and request tracing
//! middleware. CORS allows any origin for development dashboards; deploys
//! restrict it at the edge.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{experiments, gateway, handlers, replay, sse};

/// Build the complete router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Liveness and status
        .route("/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        // World lifecycle
        .route("/api/world/state", get(handlers::world_state))
        .route("/api/world/start", post(handlers::world_start))
        .route("/api/world/pause", post(handlers::world_pause))
        .route("/api/world/resume", post(handlers::world_resume))
        .route("/api/world/reset", post(handlers::world_reset))
        // Agents
        .route("/api/agents", get(handlers::list_agents))
        .route("/api/agents/{id}", get(handlers::get_agent))
        // Events: recent reads and the live SSE stream
        .route("/api/events/recent", get(handlers::recent_events))
        .route("/api/events", get(sse::events))
        // Experiments
        .route(
            "/api/experiments",
            get(experiments::list).post(experiments::create),
        )
        .route(
            "/api/experiments/{id}",
            get(experiments::get).delete(experiments::delete),
        )
        .route("/api/experiments/{id}/variants", post(experiments::add_variant))
        .route("/api/experiments/{id}/run", post(experiments::run))
        .route("/api/experiments/{id}/stop", post(experiments::stop))
        // Replay (time-travel reads)
        .route("/api/replay/ticks", get(replay::ticks))
        .route("/api/replay/tick/{n}", get(replay::tick_summary))
        .route("/api/replay/tick/{n}/events", get(replay::tick_events))
        .route("/api/replay/events", get(replay::events_range))
        .route("/api/replay/agent/{id}/history", get(replay::agent_history))
        .route("/api/replay/agent/{id}/timeline", get(replay::agent_timeline))
        // External agent gateway
        .route("/api/v1/agents/register", post(gateway::register))
        .route("/api/v1/agents/{id}/observe", get(gateway::observe))
        .route("/api/v1/agents/{id}/decide", post(gateway::decide))
        .route("/api/v1/agents/{id}", delete(gateway::deregister))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
