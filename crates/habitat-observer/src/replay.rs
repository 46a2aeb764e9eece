//! Time-travel reads over the event log.
//!
//! Replay serves the retained in-memory window of the log (the full
//! history lives in the relational store). Readers of a committed tick
//! see all of its events: appends happen before the tick counter
//! advances, so anything at `tick <= currentTick` is complete.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use habitat_types::{AgentId, WorldEvent};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// Default and maximum limits for range reads.
const DEFAULT_RANGE_LIMIT: usize = 500;
const MAX_RANGE_LIMIT: usize = 2000;

/// Query parameters for `GET /api/replay/events`.
#[derive(Debug, serde::Deserialize)]
pub struct RangeQuery {
    /// First tick, inclusive.
    pub from: Option<u64>,
    /// Last tick, inclusive.
    pub to: Option<u64>,
    /// Event cap.
    pub limit: Option<usize>,
}

/// Query parameters for agent history reads.
#[derive(Debug, serde::Deserialize)]
pub struct LimitQuery {
    /// Event cap.
    pub limit: Option<usize>,
}

/// `GET /api/replay/ticks` -- ticks with at least one retained event.
pub async fn ticks(State(state): State<AppState>) -> Json<Vec<u64>> {
    Json(state.engine().deps().log.ticks().await)
}

/// `GET /api/replay/tick/{n}` -- a summary of one tick.
pub async fn tick_summary(
    State(state): State<AppState>,
    Path(tick): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let events = state.engine().deps().log.at_tick(tick).await;
    let mut by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in &events {
        *by_type.entry(event.event_type.as_str()).or_default() += 1;
    }
    Ok(Json(json!({
        "tick": tick,
        "eventCount": events.len(),
        "byType": by_type,
    })))
}

/// `GET /api/replay/tick/{n}/events` -- the full events of one tick, in
/// version order.
pub async fn tick_events(
    State(state): State<AppState>,
    Path(tick): Path<u64>,
) -> Json<Vec<WorldEvent>> {
    Json(state.engine().deps().log.at_tick(tick).await)
}

/// `GET /api/replay/events?from&to&limit` -- an inclusive tick range.
pub async fn events_range(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<WorldEvent>>, ApiError> {
    let from = query.from.unwrap_or(0);
    let to = query.to.unwrap_or(u64::MAX);
    if from > to {
        return Err(ApiError::BadRequest(String::from("from must be <= to")));
    }
    let limit = query.limit.unwrap_or(DEFAULT_RANGE_LIMIT).min(MAX_RANGE_LIMIT);
    Ok(Json(state.engine().deps().log.in_range(from, to, limit).await))
}

/// `GET /api/replay/agent/{id}/history` -- an agent's events, oldest
/// first.
pub async fn agent_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<WorldEvent>>, ApiError> {
    let agent_id = parse_agent_id(&id)?;
    let limit = query.limit.unwrap_or(DEFAULT_RANGE_LIMIT).min(MAX_RANGE_LIMIT);
    let mut events = state
        .engine()
        .deps()
        .log
        .agent_timeline(agent_id, limit)
        .await;
    events.reverse();
    Ok(Json(events))
}

/// `GET /api/replay/agent/{id}/timeline` -- an agent's newest events,
/// newest first.
pub async fn agent_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<WorldEvent>>, ApiError> {
    let agent_id = parse_agent_id(&id)?;
    let limit = query.limit.unwrap_or(100).min(MAX_RANGE_LIMIT);
    Ok(Json(
        state
            .engine()
            .deps()
            .log
            .agent_timeline(agent_id, limit)
            .await,
    ))
}

/// Parse a path segment into an [`AgentId`].
fn parse_agent_id(raw: &str) -> Result<AgentId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid agent id: {raw}")))
}
