//! Integration tests for the observer API.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` --
//! no TCP server, no network. The gateway tests exercise the full
//! register -> observe -> decide -> rate-limit -> deregister flow against
//! an in-memory engine stack.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use habitat_adapters::{
    AdapterLayer, AdapterSettings, GenesisClient, GenesisSettings, PolicyConfig,
};
use habitat_core::{
    EngineDeps, ExperimentController, ObservationConfig, SimulationConfig, SpawnSettings,
    TickEngine,
};
use habitat_events::{BroadcastBus, EventLog, ProjectionCache};
use habitat_observer::{build_router, AppState};
use habitat_types::WorldSize;
use habitat_world::WorldStore;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn make_state() -> AppState {
    let mut layer = AdapterLayer::new(
        AdapterSettings {
            test_mode: true,
            ..AdapterSettings::default()
        },
        None,
    )
    .unwrap();
    layer.register(PolicyConfig::fallback("fallback"));

    let deps = EngineDeps {
        store: WorldStore::new(),
        log: EventLog::new(),
        projections: ProjectionCache::new(),
        bus: BroadcastBus::new(),
        adapters: Arc::new(layer),
    };
    let config = SimulationConfig::parse("{}").unwrap();
    let engine = TickEngine::new(deps, &config);
    let _ = engine
        .deps()
        .store
        .init_world_state(WorldSize::default())
        .await;

    let controller = ExperimentController::new(
        engine,
        GenesisClient::new(GenesisSettings::default(), None),
        SpawnSettings::default(),
        WorldSize::default(),
    )
    .await;
    AppState::new(controller, ObservationConfig::default())
}

async fn send(
    state: &AppState,
    method: &str,
    path: &str,
    body: Option<Value>,
    api_key: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(key) = api_key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let state = make_state().await;
    let (status, body) = send(&state, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn status_reports_engine_and_cache() {
    let state = make_state().await;
    let (status, body) = send(&state, "GET", "/api/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"], "stopped");
    assert_eq!(body["tick"], 0);
    assert!(body["cache"]["hits"].is_number());
}

#[tokio::test]
async fn world_state_rebuilds_snapshot() {
    let state = make_state().await;
    let (status, body) = send(&state, "GET", "/api/world/state", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tick"], 0);
    assert!(body["agents"].is_array());
}

#[tokio::test]
async fn unknown_agent_is_404() {
    let state = make_state().await;
    let missing = habitat_types::AgentId::new();
    let (status, body) = send(
        &state,
        "GET",
        &format!("/api/agents/{missing}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn experiments_crud_and_run_guardrails() {
    let state = make_state().await;

    let (status, created) = send(
        &state,
        "POST",
        "/api/experiments",
        Some(json!({"name": "decay study"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let experiment_id = created["id"].as_str().unwrap().to_owned();

    // Run with no pending variant: 400.
    let (status, _) = send(
        &state,
        "POST",
        &format!("/api/experiments/{experiment_id}/run"),
        Some(json!({})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Add a variant, then the listing shows it.
    let (status, _) = send(
        &state,
        "POST",
        &format!("/api/experiments/{experiment_id}/variants"),
        Some(json!({
            "name": "baseline",
            "world_seed": 42,
            "duration_ticks": 50,
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, listed) = send(&state, "GET", "/api/experiments", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["variants"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn gateway_full_flow() {
    let state = make_state().await;

    // Register: 201 and the raw key exactly once.
    let (status, registered) = send(
        &state,
        "POST",
        "/api/v1/agents/register",
        Some(json!({"name": "bot", "spawnPosition": {"x": 10, "y": 10}})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let agent_id = registered["agentId"].as_str().unwrap().to_owned();
    let api_key = registered["apiKey"].as_str().unwrap().to_owned();
    assert_eq!(api_key.len(), 64);

    // Observe requires auth.
    let observe_path = format!("/api/v1/agents/{agent_id}/observe");
    let (status, _) = send(&state, "GET", &observe_path, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, observed) = send(&state, "GET", &observe_path, None, Some(&api_key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(observed["observation"]["self"]["name"], "bot");

    // A key bound to this agent cannot observe another id.
    let other = habitat_types::AgentId::new();
    let (status, _) = send(
        &state,
        "GET",
        &format!("/api/v1/agents/{other}/observe"),
        None,
        Some(&api_key),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Self-target harm is a 400 with no event.
    let decide_path = format!("/api/v1/agents/{agent_id}/decide");
    let (status, body) = send(
        &state,
        "POST",
        &decide_path,
        Some(json!({
            "action": "harm",
            "params": {"targetAgentId": agent_id, "intensity": "moderate"},
        })),
        Some(&api_key),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("yourself"));

    // First decide accepted; second in the same tick is 429.
    let sleep_body = json!({"action": "sleep", "params": {"duration": 2}});
    let (status, accepted) = send(
        &state,
        "POST",
        &decide_path,
        Some(sleep_body.clone()),
        Some(&api_key),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["accepted"], true);

    let (status, _) = send(
        &state,
        "POST",
        &decide_path,
        Some(sleep_body),
        Some(&api_key),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Deregister: agent dead, key revoked, observe now 401 (inactive).
    let (status, _) = send(
        &state,
        "DELETE",
        &format!("/api/v1/agents/{agent_id}"),
        None,
        Some(&api_key),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&state, "GET", &observe_path, None, Some(&api_key)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn decide_with_invalid_params_is_400() {
    let state = make_state().await;
    let (_, registered) = send(
        &state,
        "POST",
        "/api/v1/agents/register",
        Some(json!({"name": "bot"})),
        None,
    )
    .await;
    let agent_id = registered["agentId"].as_str().unwrap().to_owned();
    let api_key = registered["apiKey"].as_str().unwrap().to_owned();

    let (status, body) = send(
        &state,
        "POST",
        &format!("/api/v1/agents/{agent_id}/decide"),
        Some(json!({"action": "gather", "params": {"quantity": 6}})),
        Some(&api_key),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid quantity");
}

#[tokio::test]
async fn replay_routes_serve_the_log_window() {
    let state = make_state().await;
    let (status, ticks) = send(&state, "GET", "/api/replay/ticks", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ticks.as_array().unwrap().is_empty());

    let (status, _) = send(
        &state,
        "GET",
        "/api/replay/events?from=5&to=1",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
