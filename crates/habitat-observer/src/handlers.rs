//! REST handlers: health, status, world lifecycle, agents, and recent
//! events.

use axum::extract::{Path, Query, State};
use axum::Json;
use habitat_types::{Agent, AgentId, WorldEvent};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// Hard cap on the recent-events read.
const RECENT_EVENTS_MAX: usize = 200;

/// Query parameters for `GET /api/agents`.
#[derive(Debug, serde::Deserialize)]
pub struct AgentsQuery {
    /// `alive`, `dead`, or `all` (default).
    pub status: Option<String>,
}

/// Query parameters for `GET /api/events/recent`.
#[derive(Debug, serde::Deserialize)]
pub struct RecentQuery {
    /// Number of events to return, capped at 200.
    pub limit: Option<usize>,
}

/// `GET /health` -- liveness.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /api/status` -- engine, queue, and cache statistics.
pub async fn status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = state.engine();
    let deps = engine.deps();
    let world_state = deps.store.get_world_state().await.ok();
    let cache = deps.adapters.cache_stats().await;
    let alive = deps.store.get_alive_agents().await.len();

    Ok(Json(json!({
        "engine": engine.status().as_str(),
        "tick": world_state.map_or(0, |s| s.current_tick),
        "isPaused": world_state.is_some_and(|s| s.is_paused),
        "globalEventVersion": world_state.map_or(0, |s| s.global_event_version),
        "agentsAlive": alive,
        "externalQueue": engine.external_queue_len().await,
        "subscribers": deps.bus.subscriber_count(),
        "seed": engine.seed().await,
        "testMode": deps.adapters.test_mode(),
        "cache": cache,
    })))
}

/// `GET /api/world/state` -- the full world snapshot.
///
/// Served from the projection cache; rebuilt lazily from the store after
/// an invalidation.
pub async fn world_state(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deps = state.engine().deps();
    let snapshot = match deps.projections.snapshot().await {
        Some(snapshot) => snapshot,
        None => {
            let rebuilt = deps.store.build_snapshot().await;
            deps.projections.store_snapshot(rebuilt.clone()).await;
            rebuilt
        }
    };
    Ok(Json(serde_json::to_value(snapshot).map_err(|e| {
        ApiError::Internal(format!("snapshot serialize failed: {e}"))
    })?))
}

/// `POST /api/world/start` -- spawn the world (if empty) and start the
/// engine.
pub async fn world_start(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.controller.start_world().await?;
    Ok(Json(json!({"status": "started"})))
}

/// `POST /api/world/pause`.
pub async fn world_pause(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine().pause().await?;
    Ok(Json(json!({"status": "paused"})))
}

/// `POST /api/world/resume`.
pub async fn world_resume(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine().resume().await?;
    Ok(Json(json!({"status": "running"})))
}

/// `POST /api/world/reset` -- stop the engine and wipe the world.
pub async fn world_reset(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.controller.reset_world().await;
    Ok(Json(json!({"status": "reset"})))
}

/// `GET /api/agents` -- list agents, optionally filtered by liveness.
pub async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<AgentsQuery>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    let agents = state.store().get_all_agents().await;
    let filtered: Vec<Agent> = match query.status.as_deref() {
        Some("alive") => agents.into_iter().filter(Agent::is_alive).collect(),
        Some("dead") => agents.into_iter().filter(|a| !a.is_alive()).collect(),
        Some("all") | None => agents,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "unknown status filter: {other}"
            )));
        }
    };
    Ok(Json(filtered))
}

/// `GET /api/agents/{id}` -- one agent.
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, ApiError> {
    let agent_id: AgentId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid agent id: {id}")))?;
    let agent = state.store().get_agent(agent_id).await?;
    Ok(Json(agent))
}

/// `GET /api/events/recent?limit` -- newest events, newest first, capped
/// at 200.
pub async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<WorldEvent>>, ApiError> {
    let limit = query.limit.unwrap_or(100).min(RECENT_EVENTS_MAX);
    let events = state.engine().deps().log.recent(limit).await;
    Ok(Json(events))
}
