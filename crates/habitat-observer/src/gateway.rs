//! The external agent gateway (`/api/v1`).
//!
//! External controllers register to receive a simulation agent and an API
//! key (returned exactly once -- only its SHA-256 digest is persisted),
//! then drive the agent over HTTP: `observe` returns the same observation
//! payload internal policies see, and `decide` dispatches through the
//! same action pipeline, rate-limited to one submission per tick.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use habitat_agents::validation::validate_params;
use habitat_core::observation::{build_observation, WorldView};
use habitat_core::{external_intent, EXTERNAL_POLICY};
use habitat_types::{
    ActionParams, Agent, AgentDecision, AgentId, AgentLifeState, AgentPatch, EventDraft,
    EventType, ExternalAgentId, ExternalAgentRecord,
};
use rust_decimal::Decimal;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /api/v1/agents/register`.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    /// Display name for the agent.
    pub name: String,
    /// Optional callback endpoint (informational).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Optional contact address.
    #[serde(default)]
    pub owner_email: Option<String>,
    /// Optional starting cell.
    #[serde(default)]
    pub spawn_position: Option<SpawnPosition>,
}

/// A starting cell request.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct SpawnPosition {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

/// `POST /api/v1/agents/register` -- onboard an external agent.
///
/// Returns 201 with the raw API key, exactly once.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<(axum::http::StatusCode, Json<serde_json::Value>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest(String::from("name must not be empty")));
    }
    let deps = state.engine().deps();
    let size = deps.store.world_size().await;

    let (x, y) = match body.spawn_position {
        Some(position) => {
            if !size.contains(position.x, position.y) {
                return Err(ApiError::BadRequest(String::from(
                    "spawn position out of bounds",
                )));
            }
            (position.x, position.y)
        }
        // Without a requested cell, drop in at the grid center.
        None => (
            i32::try_from(size.width / 2).unwrap_or(0),
            i32::try_from(size.height / 2).unwrap_or(0),
        ),
    };

    let spawn_index = u32::try_from(deps.store.get_all_agents().await.len()).unwrap_or(u32::MAX);
    let agent = Agent {
        id: AgentId::new(),
        name: body.name.clone(),
        policy_type: EXTERNAL_POLICY.to_owned(),
        x,
        y,
        hunger: 100.0,
        energy: 100.0,
        health: 100.0,
        balance: Decimal::from(20),
        state: AgentLifeState::Idle,
        color: String::from("#f0a050"),
        personality: None,
        spawn_index,
        sleep_ticks_remaining: 0,
        died_at: None,
        death_cause: None,
        inventory: std::collections::BTreeMap::new(),
        knowledge: std::collections::BTreeMap::new(),
        memories: Vec::new(),
        created_at: Utc::now(),
    };
    let agent_id = agent.id;

    let raw_key: [u8; 32] = rand::random();
    let api_key = hex::encode(raw_key);
    let record = ExternalAgentRecord {
        id: ExternalAgentId::new(),
        agent_id,
        name: body.name,
        api_key_hash: hash_key(&api_key),
        endpoint: body.endpoint,
        owner_email: body.owner_email,
        rate_limit_per_tick: 1,
        last_seen_at: None,
        last_decide_tick: None,
        is_active: true,
        created_at: Utc::now(),
    };

    deps.store.insert_agent(agent).await;
    deps.store.insert_external_agent(record).await;
    append_gateway_event(
        &state,
        EventDraft::for_agent(
            EventType::ExternalAgentRegistered,
            agent_id,
            json!({"x": x, "y": y}),
        ),
    )
    .await;
    info!(%agent_id, "External agent registered");

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "agentId": agent_id,
            "apiKey": api_key,
        })),
    ))
}

/// `GET /api/v1/agents/{id}/observe` -- the agent's current observation.
pub async fn observe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (record, agent) = authorize(&state, &headers, &id).await?;
    let deps = state.engine().deps();
    deps.store.touch_external_agent(record.id).await?;

    let agents = deps.store.get_all_agents().await;
    let spawns = deps.store.get_all_spawns().await;
    let shelters = deps.store.get_all_shelters().await;
    let recent = deps.log.recent(100).await;
    let world_size = deps.store.world_size().await;
    let tick = deps
        .store
        .get_world_state()
        .await
        .map_or(0, |s| s.current_tick);

    let view = WorldView {
        agents: &agents,
        spawns: &spawns,
        shelters: &shelters,
        recent_events: &recent,
        world_size,
    };
    let observation = build_observation(&agent, &view, tick, &state.observation);

    Ok(Json(json!({
        "tick": tick,
        "observation": observation,
    })))
}

/// `POST /api/v1/agents/{id}/decide` -- submit an action.
///
/// Rate-limited to one accepted submission per tick (429 on violation).
/// Parameter validation and static precondition checks happen here so a
/// bad submission gets its 400 immediately; everything else runs through
/// the same action pipeline as internal agents on the next tick.
pub async fn decide(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (record, agent) = authorize(&state, &headers, &id).await?;
    let deps = state.engine().deps();

    let decision: AgentDecision = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid decision: {e}")))?;
    validate_params(&decision.params).map_err(ApiError::BadRequest)?;
    if let Some(target) = static_target_of(&decision.params)
        && target == agent.id
    {
        return Err(ApiError::BadRequest(String::from("Cannot target yourself")));
    }

    let tick = deps
        .store
        .get_world_state()
        .await
        .map_or(0, |s| s.current_tick);
    if !deps.store.try_consume_decide_budget(record.id, tick).await? {
        return Err(ApiError::TooManyRequests(format!(
            "decide already submitted for tick {tick}"
        )));
    }

    let next_tick = tick + 1;
    state
        .engine()
        .submit_external_intent(external_intent(agent.id, next_tick, decision))
        .await;

    Ok(Json(json!({
        "accepted": true,
        "tick": next_tick,
    })))
}

/// `DELETE /api/v1/agents/{id}` -- deregister.
///
/// The simulation agent transitions to dead and the registration goes
/// inactive; the raw key stops working immediately.
pub async fn deregister(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (record, agent) = authorize_allow_dead(&state, &headers, &id).await?;
    let deps = state.engine().deps();

    let patch = AgentPatch {
        state: Some(AgentLifeState::Dead),
        died_at: Some(Utc::now()),
        ..AgentPatch::default()
    };
    deps.store.update_agent(agent.id, &patch).await?;
    deps.store.deactivate_external_agent(record.id).await?;
    append_gateway_event(
        &state,
        EventDraft::for_agent(EventType::ExternalAgentDeregistered, agent.id, json!({})),
    )
    .await;
    info!(agent_id = %agent.id, "External agent deregistered");

    Ok(Json(json!({"status": "deregistered"})))
}

/// Authenticate a request and bind it to the path agent.
///
/// 401 without a valid key, 403 when the key's agent differs from the
/// path, 404 when the simulation agent is missing, 410 when it is dead.
async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    path_id: &str,
) -> Result<(ExternalAgentRecord, Agent), ApiError> {
    let (record, agent) = authorize_allow_dead(state, headers, path_id).await?;
    if !agent.is_alive() {
        return Err(ApiError::Gone(format!("agent {} is dead", agent.id)));
    }
    Ok((record, agent))
}

/// [`authorize`] without the liveness gate (deregistration of a dead
/// agent is legitimate).
async fn authorize_allow_dead(
    state: &AppState,
    headers: &HeaderMap,
    path_id: &str,
) -> Result<(ExternalAgentRecord, Agent), ApiError> {
    let key = extract_key(headers)
        .ok_or_else(|| ApiError::Unauthorized(String::from("missing API key")))?;
    let record = state
        .store()
        .find_external_by_key_hash(&hash_key(&key))
        .await
        .ok_or_else(|| ApiError::Unauthorized(String::from("invalid API key")))?;

    let requested: AgentId = path_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid agent id: {path_id}")))?;
    if record.agent_id != requested {
        return Err(ApiError::Forbidden(String::from(
            "API key is not bound to this agent",
        )));
    }
    let agent = state.store().get_agent(requested).await?;
    Ok((record, agent))
}

/// Pull the API key from `Authorization: Bearer` or `X-API-Key`.
fn extract_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("authorization")
        && let Ok(text) = value.to_str()
        && let Some(stripped) = text.strip_prefix("Bearer ")
    {
        return Some(stripped.trim().to_owned());
    }
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_owned())
}

/// Hex-encoded SHA-256 of an API key.
fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// The target an action names statically, if any.
const fn static_target_of(params: &ActionParams) -> Option<AgentId> {
    match params {
        ActionParams::Trade {
            target_agent_id, ..
        }
        | ActionParams::Harm {
            target_agent_id, ..
        }
        | ActionParams::Steal {
            target_agent_id, ..
        }
        | ActionParams::Deceive {
            target_agent_id, ..
        }
        | ActionParams::ShareInfo {
            target_agent_id, ..
        } => Some(*target_agent_id),
        _ => None,
    }
}

/// Append a gateway-originated event at the current tick and fan it out.
async fn append_gateway_event(state: &AppState, draft: EventDraft) {
    let deps = state.engine().deps();
    let tick = deps
        .store
        .get_world_state()
        .await
        .map_or(0, |s| s.current_tick);
    let event = deps.log.append(tick, draft).await;
    deps.projections.on_event(&event).await;
    let _ = deps.bus.publish(&event);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_hash_is_stable_hex() {
        let a = hash_key("secret");
        let b = hash_key("secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_key("other"));
    }

    #[test]
    fn bearer_and_header_keys_extract() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_key(&headers), Some(String::from("abc123")));

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-api-key", "raw-key".parse().unwrap());
        assert_eq!(extract_key(&headers), Some(String::from("raw-key")));

        assert_eq!(extract_key(&HeaderMap::new()), None);
    }

    #[test]
    fn static_targets_cover_conflict_and_social_actions() {
        let target = AgentId::new();
        let params = ActionParams::Harm {
            target_agent_id: target,
            intensity: habitat_types::HarmIntensity::Light,
        };
        assert_eq!(static_target_of(&params), Some(target));
        assert_eq!(
            static_target_of(&ActionParams::Sleep { duration: 1 }),
            None
        );
    }
}
